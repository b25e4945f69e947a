#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chess_core::StandardRules;
use futures::{SinkExt, StreamExt};
use game_server::auth::jwt;
use game_server::config::Config;
use game_server::db::MemoryStore;
use game_server::engine::{BotDifficulty, EngineError, MoveEngine};
use game_server::rooms::RoomRegistry;
use game_server::routes;
use game_server::session::SessionManager;
use reqwest::Client;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::{tungstenite::Message, MaybeTlsStream, WebSocketStream};

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A server running in-process on an ephemeral port.
pub struct TestServer {
    pub addr: String,
    pub config: Config,
    pub sessions: Arc<SessionManager>,
    pub rooms: Arc<RoomRegistry>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(SessionManager::new(
            Arc::new(MemoryStore::new()),
            Arc::new(StandardRules::new()),
        ))
        .await
    }

    pub async fn start_with_engine(engine: Arc<dyn MoveEngine>) -> Self {
        Self::start_with(
            SessionManager::new(Arc::new(MemoryStore::new()), Arc::new(StandardRules::new()))
                .with_engine(engine),
        )
        .await
    }

    pub async fn start_with(sessions: SessionManager) -> Self {
        let config = Config::for_tests();
        let rooms = Arc::new(RoomRegistry::new(config.outbound_buffer));
        let sessions = Arc::new(sessions.with_publisher(rooms.clone()));
        let app = routes::router(sessions.clone(), rooms.clone(), config.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("No local addr").to_string();
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server error");
        });

        Self {
            addr,
            config,
            sessions,
            rooms,
        }
    }

    /// Build a URL for an API endpoint.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, code: &str, query: &str) -> String {
        format!("ws://{}/api/games/{}/ws?{}", self.addr, code, query)
    }

    /// Bearer token for a registered user.
    pub fn token(&self, user_id: i64, username: &str) -> String {
        jwt::create_token(user_id, username, &self.config.jwt_secret, 1).expect("Failed to sign token")
    }
}

/// Build a reqwest client for tests.
pub fn client() -> Client {
    Client::new()
}

pub async fn post_json(
    client: &Client,
    url: &str,
    token: Option<&str>,
    body: Value,
) -> (reqwest::StatusCode, Value) {
    let mut req = client.post(url).json(&body);
    if let Some(token) = token {
        req = req.bearer_auth(token);
    }
    let resp = req.send().await.expect("Failed to send request");
    let status = resp.status();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

pub async fn get_json(client: &Client, url: &str) -> (reqwest::StatusCode, Value) {
    get_json_as(client, url, None).await
}

pub async fn get_json_as(client: &Client, url: &str, token: Option<&str>) -> (reqwest::StatusCode, Value) {
    let mut req = client.get(url);
    if let Some(token) = token {
        req = req.bearer_auth(token);
    }
    let resp = req.send().await.expect("Failed to send request");
    let status = resp.status();
    let body = resp.json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

pub async fn connect(url: &str) -> Socket {
    let (socket, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("Failed to connect websocket");
    socket
}

pub async fn send(socket: &mut Socket, message: Value) {
    socket
        .send(Message::Text(message.to_string().into()))
        .await
        .expect("Failed to send message");
}

/// Next server event of type `kind`, skipping others. Panics after two seconds.
pub async fn expect_event(socket: &mut Socket, kind: &str) -> Value {
    let wait = async {
        while let Some(msg) = socket.next().await {
            let msg = msg.expect("Websocket error");
            if !msg.is_text() {
                continue;
            }
            let event: Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
            if event["type"] == kind {
                return event;
            }
        }
        panic!("socket closed while waiting for {kind}");
    };
    tokio::time::timeout(Duration::from_secs(2), wait)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {kind}"))
}

/// Engine that plays a fixed list of replies in order.
pub struct ScriptedEngine {
    replies: Mutex<VecDeque<&'static str>>,
}

impl ScriptedEngine {
    pub fn new(replies: &[&'static str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().copied().collect()),
        }
    }
}

#[async_trait]
impl MoveEngine for ScriptedEngine {
    async fn best_move(&self, _fen: &str, _difficulty: BotDifficulty) -> Result<String, EngineError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .map(String::from)
            .ok_or(EngineError::NoMove)
    }
}

/// Wait until the server has registered `n` sockets in `code`'s room.
pub async fn wait_for_connections(server: &TestServer, code: &str, n: usize) {
    for _ in 0..100 {
        if server.rooms.connection_count(code).await >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("room {code} never reached {n} connections");
}

/// Engine that fails its first call, then plays a fixed list of replies.
pub struct FlakyEngine {
    calls: AtomicUsize,
    script: ScriptedEngine,
}

impl FlakyEngine {
    pub fn new(replies: &[&'static str]) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            script: ScriptedEngine::new(replies),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MoveEngine for FlakyEngine {
    async fn best_move(&self, fen: &str, difficulty: BotDifficulty) -> Result<String, EngineError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err(EngineError::Process("engine crashed".into()));
        }
        self.script.best_move(fen, difficulty).await
    }
}

/// Wait until the engine has been asked `n` times.
pub async fn wait_for_engine_calls(engine: &FlakyEngine, n: usize) {
    for _ in 0..100 {
        if engine.calls() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("engine was never called {n} times");
}

/// Wait until `code` has at least `n` moves on record.
pub async fn wait_for_moves(server: &TestServer, code: &str, n: usize) {
    for _ in 0..100 {
        let count = server.sessions.get_session(code).await.map_or(0, |g| g.move_count);
        if count >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("game {code} never reached {n} moves");
}
