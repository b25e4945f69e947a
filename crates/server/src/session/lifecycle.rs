use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chess_core::game_data::{GameData, GameMetadata};
use chess_core::{pgn, Rules, Side};
use chrono::Utc;
use rand::distributions::{Alphanumeric, DistString};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::error::SessionError;
use super::events::{EventSink, GameEvent, SessionPublisher};
use super::model::{
    ColorChoice, GameResult, GameSession, GameStatus, Identity, MoveRecord, Occupant, Seat,
    SessionView, TimeControl,
};
use super::pipeline::MoveOutcome;
use crate::db::{SessionStore, StoreError};
use crate::engine::{BotDifficulty, MoveEngine};

const CODE_LEN: usize = 8;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const CODE_ATTEMPTS: usize = 16;
const GUEST_TOKEN_LEN: usize = 32;
const DEFAULT_GUEST_NAME: &str = "Guest";
const HISTORY_MAX: usize = 50;

pub(crate) type SessionHandle = Arc<Mutex<GameSession>>;

/// Owns every live session and the collaborators that act on them. Only
/// Waiting and Active sessions stay in memory; finished ones live in the store.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) rules: Arc<dyn Rules>,
    pub(crate) engine: Option<Arc<dyn MoveEngine>>,
    /// Codes with an engine reply in flight.
    pub(crate) engine_busy: std::sync::Mutex<HashSet<String>>,
    sinks: Vec<Arc<dyn EventSink>>,
    publisher: Option<Arc<dyn SessionPublisher>>,
    color_rng: std::sync::Mutex<StdRng>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, rules: Arc<dyn Rules>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
            rules,
            engine: None,
            engine_busy: std::sync::Mutex::new(HashSet::new()),
            sinks: Vec::new(),
            publisher: None,
            color_rng: std::sync::Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn MoveEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn SessionPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Make random color assignment reproducible.
    pub fn with_rng_seed(self, seed: u64) -> Self {
        Self {
            color_rng: std::sync::Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// The live handle for `code`, loading it from the store on first access.
    /// Finished sessions are handed out detached and never cached.
    pub(crate) async fn handle(&self, code: &str) -> Result<SessionHandle, SessionError> {
        if let Some(handle) = self.sessions.read().await.get(code) {
            return Ok(handle.clone());
        }

        // Load under the write lock so a session finished and evicted meanwhile
        // cannot be re-cached from a stale read.
        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(code) {
            return Ok(handle.clone());
        }
        let session = self
            .store
            .load_session(code)
            .await?
            .ok_or_else(SessionError::not_found)?;

        let live = !session.status.is_terminal();
        let handle = Arc::new(Mutex::new(session));
        if live {
            sessions.insert(code.to_string(), handle.clone());
        }
        Ok(handle)
    }

    pub(crate) fn resolve_color(&self, choice: ColorChoice) -> Side {
        match choice {
            ColorChoice::White => Side::White,
            ColorChoice::Black => Side::Black,
            ColorChoice::Random => {
                let mut rng = self.color_rng.lock().unwrap_or_else(|e| e.into_inner());
                if rng.gen_bool(0.5) {
                    Side::White
                } else {
                    Side::Black
                }
            }
        }
    }

    pub(crate) fn emit(&self, event: GameEvent) {
        for sink in &self.sinks {
            sink.emit(&event);
        }
    }

    /// Drop a finished session from the live map. Callers still holding its
    /// handle see the terminal status and back off.
    pub(crate) async fn evict(&self, code: &str) {
        if self.sessions.write().await.remove(code).is_some() {
            debug!(code, "session evicted");
        }
    }

    pub(crate) async fn publish_move(&self, outcome: &MoveOutcome) {
        if let Some(publisher) = &self.publisher {
            publisher.move_committed(&outcome.record.game_code, outcome).await;
        }
    }

    /// Events for a session that just reached a terminal status.
    pub(crate) fn emit_finished(&self, session: &GameSession) {
        let (Some(result), Some(reason)) = (session.result, session.end_reason.as_deref()) else {
            return;
        };
        self.emit(GameEvent::GameFinished {
            code: session.code.clone(),
            result,
            reason: reason.to_string(),
        });

        let Some(winner) = result.winner() else {
            return;
        };
        if let Occupant::Registered(user) = session.occupant(winner) {
            self.emit(GameEvent::GameWon {
                user_id: user.id,
                code: session.code.clone(),
                color: winner,
            });
            if reason == "checkmate" {
                self.emit(GameEvent::CheckmateDelivered {
                    user_id: user.id,
                    code: session.code.clone(),
                });
            }
        }
    }

    /// Insert a brand new session under a fresh code.
    async fn insert_new(
        &self,
        mut build: impl FnMut(String) -> GameSession,
    ) -> Result<GameSession, SessionError> {
        for _ in 0..CODE_ATTEMPTS {
            let code = generate_code();
            let cached = self.sessions.read().await.contains_key(&code);
            if cached || self.store.session_exists(&code).await? {
                continue;
            }

            let session = build(code);
            match self.store.insert_session(&session).await {
                Ok(()) => {}
                Err(StoreError::Duplicate(_)) => continue,
                Err(e) => return Err(e.into()),
            }

            self.sessions
                .write()
                .await
                .insert(session.code.clone(), Arc::new(Mutex::new(session.clone())));
            return Ok(session);
        }
        Err(SessionError::Internal("Could not allocate a game code".into()))
    }

    pub async fn create_session(
        &self,
        requester: &Identity,
        time_control: TimeControl,
        color: ColorChoice,
    ) -> Result<(SessionView, Seat), SessionError> {
        let side = self.resolve_color(color);
        let (occupant, guest_token) = occupant_for(requester);
        let now = Utc::now();

        let session = self
            .insert_new(|code| GameSession::new(code, side, occupant.clone(), time_control, now))
            .await?;

        info!(
            code = %session.code,
            color = %side,
            time_control = time_control.as_str(),
            creator = %occupant.display_name(),
            "game created"
        );
        Ok((session.view(), Seat { color: side, guest_token }))
    }

    /// A game against the computer. It starts Active immediately.
    pub async fn create_engine_session(
        &self,
        requester: &Identity,
        difficulty: BotDifficulty,
        color: ColorChoice,
        time_control: TimeControl,
    ) -> Result<(SessionView, Seat), SessionError> {
        if self.engine.is_none() {
            return Err(SessionError::Unavailable("Engine is not available".into()));
        }

        let side = self.resolve_color(color);
        let (occupant, guest_token) = occupant_for(requester);
        let now = Utc::now();

        let session = self
            .insert_new(|code| {
                let mut session = GameSession::new(code, side, occupant.clone(), time_control, now);
                session.seat(side.opposite(), Occupant::Engine(difficulty));
                session.start(now);
                session
            })
            .await?;

        info!(
            code = %session.code,
            color = %side,
            difficulty = difficulty.as_str(),
            "engine game created"
        );
        Ok((session.view(), Seat { color: side, guest_token }))
    }

    pub async fn join_session(
        &self,
        code: &str,
        requester: &Identity,
    ) -> Result<(SessionView, Seat), SessionError> {
        let handle = self.handle(code).await?;
        let mut session = handle.lock().await;

        if let Some(color) = session.player_color(requester) {
            let seat = Seat {
                color,
                guest_token: requester.guest_token().map(String::from),
            };
            return Ok((session.view(), seat));
        }

        if session.status != GameStatus::Waiting {
            return Err(SessionError::InvalidState("Game is not waiting for players".into()));
        }

        let Some(vacant) = [Side::White, Side::Black]
            .into_iter()
            .find(|side| session.occupant(*side).is_empty())
        else {
            return Err(SessionError::Conflict("Game is full".into()));
        };

        let (occupant, guest_token) = occupant_for(requester);
        let mut next = session.clone();
        next.seat(vacant, occupant);
        next.start(Utc::now());
        self.store.save_session(&next).await?;
        *session = next;

        info!(code = %session.code, color = %vacant, "player joined, game started");
        Ok((session.view(), Seat { color: vacant, guest_token }))
    }

    pub async fn resign_session(&self, code: &str, requester: &Identity) -> Result<SessionView, SessionError> {
        let handle = self.handle(code).await?;
        let mut session = handle.lock().await;

        if session.status != GameStatus::Active {
            return Err(SessionError::InvalidState("Game is not active".into()));
        }
        let color = session
            .player_color(requester)
            .ok_or_else(|| SessionError::Forbidden("You are not a player in this game".into()))?;

        self.finish(&mut session, GameStatus::Completed, GameResult::win_for(color.opposite()), "resignation")
            .await?;
        info!(code = %session.code, color = %color, "player resigned");
        Ok(session.view())
    }

    pub async fn timeout_session(&self, code: &str, timed_out: Side) -> Result<SessionView, SessionError> {
        let handle = self.handle(code).await?;
        let mut session = handle.lock().await;

        if session.status != GameStatus::Active {
            return Err(SessionError::InvalidState("Game is not active".into()));
        }

        self.finish(&mut session, GameStatus::Completed, GameResult::win_for(timed_out.opposite()), "timeout")
            .await?;
        info!(code = %session.code, color = %timed_out, "flag fell");
        Ok(session.view())
    }

    /// The creator cancels a game nobody has joined yet.
    pub async fn abandon_session(&self, code: &str, requester: &Identity) -> Result<SessionView, SessionError> {
        let handle = self.handle(code).await?;
        let mut session = handle.lock().await;

        if session.status != GameStatus::Waiting {
            return Err(SessionError::InvalidState("Only waiting games can be abandoned".into()));
        }
        if session.player_color(requester) != Some(session.creator_color) {
            return Err(SessionError::Forbidden("Only the creator can abandon this game".into()));
        }

        self.finish(&mut session, GameStatus::Abandoned, GameResult::Abandoned, "abandoned")
            .await?;
        info!(code = %session.code, "game abandoned");
        Ok(session.view())
    }

    async fn finish(
        &self,
        session: &mut GameSession,
        status: GameStatus,
        result: GameResult,
        reason: &str,
    ) -> Result<(), SessionError> {
        let mut next = session.clone();
        next.finish(status, result, reason, Utc::now());
        self.store.save_session(&next).await?;
        *session = next;
        self.emit_finished(session);

        if let Some(publisher) = &self.publisher {
            publisher.game_ended(&session.code, result, reason).await;
        }
        self.evict(&session.code).await;
        Ok(())
    }

    pub async fn get_session(&self, code: &str) -> Result<SessionView, SessionError> {
        let handle = self.handle(code).await?;
        let session = handle.lock().await;
        Ok(session.view())
    }

    /// Which color `identity` plays in `code`; `None` for spectators.
    pub async fn player_color(&self, code: &str, identity: &Identity) -> Result<Option<Side>, SessionError> {
        let handle = self.handle(code).await?;
        let session = handle.lock().await;
        Ok(session.player_color(identity))
    }

    /// Raw session snapshot, including occupants.
    pub async fn snapshot(&self, code: &str) -> Result<GameSession, SessionError> {
        let handle = self.handle(code).await?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    pub async fn moves(&self, code: &str) -> Result<Vec<MoveRecord>, SessionError> {
        let handle = self.handle(code).await?;
        let session = handle.lock().await;
        Ok(session.moves.clone())
    }

    pub async fn pgn(&self, code: &str) -> Result<String, SessionError> {
        let handle = self.handle(code).await?;
        let session = handle.lock().await;

        let game = GameData {
            metadata: GameMetadata {
                event: "Chessly Game".into(),
                site: "Chessly".into(),
                date: session.created_at.format("%Y.%m.%d").to_string(),
                white: session.white.display_name(),
                black: session.black.display_name(),
                result: session.result.map(|r| r.pgn_token()).unwrap_or("*").to_string(),
                time_control: Some(session.time_control.pgn_label()),
                termination: session.end_reason.clone(),
            },
            moves: session.moves.iter().map(|m| m.move_san.clone()).collect(),
        };
        Ok(pgn::write_pgn(&game))
    }

    /// Most recent games a registered user sat in, newest first.
    pub async fn list_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<SessionView>, SessionError> {
        let games = self
            .store
            .list_for_user(user_id, limit.clamp(1, HISTORY_MAX))
            .await?;
        Ok(games.iter().map(GameSession::view).collect())
    }

    /// Sessions currently held in memory.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn generate_guest_token() -> String {
    Alphanumeric.sample_string(&mut rand::thread_rng(), GUEST_TOKEN_LEN)
}

/// Seat occupant for a requester taking a new seat. Guests get a fresh token.
fn occupant_for(requester: &Identity) -> (Occupant, Option<String>) {
    match requester {
        Identity::Registered(user) => (Occupant::Registered(user.clone()), None),
        Identity::Guest(creds) => {
            let name = creds
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .unwrap_or(DEFAULT_GUEST_NAME)
                .to_string();
            let token = generate_guest_token();
            (
                Occupant::Guest {
                    name,
                    token: token.clone(),
                },
                Some(token),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::session::model::UserRef;
    use chess_core::StandardRules;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingSink {
        events: StdMutex<Vec<GameEvent>>,
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: &GameEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn manager() -> SessionManager {
        SessionManager::new(Arc::new(MemoryStore::new()), Arc::new(StandardRules::new()))
    }

    fn user(id: i64, name: &str) -> Identity {
        Identity::Registered(UserRef { id, username: name.into() })
    }

    #[tokio::test]
    async fn test_create_session_waiting_with_creator_seated() {
        let mgr = manager();
        let (view, seat) = mgr
            .create_session(&user(1, "alice"), TimeControl::Rapid15, ColorChoice::Black)
            .await
            .unwrap();

        assert_eq!(view.status, GameStatus::Waiting);
        assert_eq!(view.code.len(), CODE_LEN);
        assert!(view.code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        assert_eq!(seat.color, Side::Black);
        assert_eq!(seat.guest_token, None);
        assert!(view.white_player.is_none());
        assert_eq!(view.black_player.unwrap().id, Some(1));
        assert_eq!(view.white_time_remaining, 900);
        assert!(view.started_at.is_none());
    }

    #[tokio::test]
    async fn test_guest_create_mints_token() {
        let mgr = manager();
        let (view, seat) = mgr
            .create_session(&Identity::guest(Some("  Ann ".into()), None), TimeControl::Blitz5, ColorChoice::White)
            .await
            .unwrap();

        let token = seat.guest_token.unwrap();
        assert_eq!(token.len(), GUEST_TOKEN_LEN);
        assert_eq!(view.white_player.unwrap().username, "Ann");
        assert_eq!(
            mgr.player_color(&view.code, &Identity::guest(None, Some(token))).await.unwrap(),
            Some(Side::White)
        );
    }

    #[tokio::test]
    async fn test_join_activates_and_is_idempotent() {
        let mgr = manager();
        let (view, _) = mgr
            .create_session(&user(1, "alice"), TimeControl::Blitz5, ColorChoice::White)
            .await
            .unwrap();

        let (joined, seat) = mgr.join_session(&view.code, &user(2, "bob")).await.unwrap();
        assert_eq!(seat.color, Side::Black);
        assert_eq!(joined.status, GameStatus::Active);
        let started = joined.started_at.unwrap();

        let (again, seat) = mgr.join_session(&view.code, &user(2, "bob")).await.unwrap();
        assert_eq!(seat.color, Side::Black);
        assert_eq!(again.started_at, Some(started));

        // The creator re-joining gets their own seat back.
        let (_, seat) = mgr.join_session(&view.code, &user(1, "alice")).await.unwrap();
        assert_eq!(seat.color, Side::White);
    }

    #[tokio::test]
    async fn test_join_rejections() {
        let mgr = manager();
        assert!(matches!(
            mgr.join_session("missing0", &user(2, "bob")).await,
            Err(SessionError::NotFound(_))
        ));

        let (view, _) = mgr
            .create_session(&user(1, "alice"), TimeControl::Blitz5, ColorChoice::White)
            .await
            .unwrap();
        mgr.join_session(&view.code, &user(2, "bob")).await.unwrap();

        let err = mgr.join_session(&view.code, &user(3, "carol")).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_guest_with_wrong_token_gets_new_seat_not_existing_one() {
        let mgr = manager();
        let (view, _) = mgr
            .create_session(&Identity::guest(Some("Ann".into()), None), TimeControl::Blitz5, ColorChoice::White)
            .await
            .unwrap();

        let impostor = Identity::guest(Some("Ann".into()), Some("forged-token".into()));
        let (_, seat) = mgr.join_session(&view.code, &impostor).await.unwrap();
        assert_eq!(seat.color, Side::Black);
        assert_ne!(seat.guest_token.as_deref(), Some("forged-token"));
    }

    #[tokio::test]
    async fn test_random_color_seeded_is_balanced() {
        let mgr = manager().with_rng_seed(42);
        let whites = (0..1000)
            .filter(|_| mgr.resolve_color(ColorChoice::Random) == Side::White)
            .count();
        assert!((350..=650).contains(&whites), "whites = {whites}");
    }

    #[tokio::test]
    async fn test_resign_and_timeout() {
        let sink = Arc::new(RecordingSink::default());
        let mgr = manager().with_sink(sink.clone());
        let (view, _) = mgr
            .create_session(&user(1, "alice"), TimeControl::Blitz5, ColorChoice::White)
            .await
            .unwrap();

        // Not active yet.
        assert!(matches!(
            mgr.resign_session(&view.code, &user(1, "alice")).await,
            Err(SessionError::InvalidState(_))
        ));
        mgr.join_session(&view.code, &user(2, "bob")).await.unwrap();

        assert!(matches!(
            mgr.resign_session(&view.code, &user(3, "carol")).await,
            Err(SessionError::Forbidden(_))
        ));

        let done = mgr.resign_session(&view.code, &user(2, "bob")).await.unwrap();
        assert_eq!(done.status, GameStatus::Completed);
        assert_eq!(done.result, Some(GameResult::WhiteWin));
        assert_eq!(done.end_reason.as_deref(), Some("resignation"));
        assert!(done.ended_at.is_some());

        assert!(matches!(
            mgr.timeout_session(&view.code, Side::White).await,
            Err(SessionError::InvalidState(_))
        ));

        let events = sink.events.lock().unwrap();
        assert!(events.contains(&GameEvent::GameWon {
            user_id: 1,
            code: view.code.clone(),
            color: Side::White
        }));
    }

    #[tokio::test]
    async fn test_timeout_loses_for_flagged_side() {
        let mgr = manager();
        let (view, _) = mgr
            .create_session(&user(1, "alice"), TimeControl::Bullet1, ColorChoice::White)
            .await
            .unwrap();
        mgr.join_session(&view.code, &user(2, "bob")).await.unwrap();

        let done = mgr.timeout_session(&view.code, Side::White).await.unwrap();
        assert_eq!(done.result, Some(GameResult::BlackWin));
        assert_eq!(done.end_reason.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_abandon_only_by_creator_while_waiting() {
        let mgr = manager();
        let (view, _) = mgr
            .create_session(&user(1, "alice"), TimeControl::Blitz5, ColorChoice::White)
            .await
            .unwrap();

        assert!(matches!(
            mgr.abandon_session(&view.code, &user(2, "bob")).await,
            Err(SessionError::Forbidden(_))
        ));

        let done = mgr.abandon_session(&view.code, &user(1, "alice")).await.unwrap();
        assert_eq!(done.status, GameStatus::Abandoned);
        assert_eq!(done.result, Some(GameResult::Abandoned));

        assert!(matches!(
            mgr.join_session(&view.code, &user(2, "bob")).await,
            Err(SessionError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_engine_session_requires_engine() {
        let mgr = manager();
        let err = mgr
            .create_engine_session(&user(1, "alice"), BotDifficulty::Easy, ColorChoice::White, TimeControl::Blitz5)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_sessions_reload_from_store() {
        let store = Arc::new(MemoryStore::new());
        let first = SessionManager::new(store.clone(), Arc::new(StandardRules::new()));
        let (view, _) = first
            .create_session(&user(1, "alice"), TimeControl::Blitz5, ColorChoice::White)
            .await
            .unwrap();

        let second = SessionManager::new(store, Arc::new(StandardRules::new()));
        assert_eq!(second.session_count().await, 0);
        let loaded = second.get_session(&view.code).await.unwrap();
        assert_eq!(loaded.code, view.code);
        assert_eq!(second.session_count().await, 1);
    }

    #[tokio::test]
    async fn test_pgn_export_headers() {
        let mgr = manager();
        let (view, _) = mgr
            .create_session(&user(1, "alice"), TimeControl::Rapid15, ColorChoice::White)
            .await
            .unwrap();
        mgr.join_session(&view.code, &user(2, "bob")).await.unwrap();
        mgr.resign_session(&view.code, &user(1, "alice")).await.unwrap();

        let pgn = mgr.pgn(&view.code).await.unwrap();
        assert!(pgn.contains("[White \"alice\"]"));
        assert!(pgn.contains("[Black \"bob\"]"));
        assert!(pgn.contains("[Result \"0-1\"]"));
        assert!(pgn.contains("[TimeControl \"900+10\"]"));
        assert!(pgn.contains("[Termination \"resignation\"]"));
    }

    #[tokio::test]
    async fn test_finished_sessions_leave_memory() {
        let mgr = manager();
        for _ in 0..200 {
            let (view, _) = mgr
                .create_session(&user(1, "alice"), TimeControl::Blitz5, ColorChoice::White)
                .await
                .unwrap();
            mgr.abandon_session(&view.code, &user(1, "alice")).await.unwrap();
        }
        assert_eq!(mgr.session_count().await, 0);

        let (view, _) = mgr
            .create_session(&user(1, "alice"), TimeControl::Blitz5, ColorChoice::White)
            .await
            .unwrap();
        mgr.join_session(&view.code, &user(2, "bob")).await.unwrap();
        assert_eq!(mgr.session_count().await, 1);
        mgr.resign_session(&view.code, &user(1, "alice")).await.unwrap();
        assert_eq!(mgr.session_count().await, 0);

        // Still readable, served from the store without being cached again.
        let done = mgr.get_session(&view.code).await.unwrap();
        assert_eq!(done.result, Some(GameResult::BlackWin));
        assert_eq!(mgr.session_count().await, 0);
        assert!(matches!(
            mgr.resign_session(&view.code, &user(2, "bob")).await,
            Err(SessionError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let mgr = manager();
        let mut codes = Vec::new();
        for _ in 0..3 {
            let (view, _) = mgr
                .create_session(&user(1, "alice"), TimeControl::Blitz5, ColorChoice::White)
                .await
                .unwrap();
            codes.push(view.code);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        mgr.join_session(&codes[0], &user(2, "bob")).await.unwrap();

        let alice = mgr.list_for_user(1, 10).await.unwrap();
        let listed: Vec<&str> = alice.iter().map(|g| g.code.as_str()).collect();
        assert_eq!(listed, vec![codes[2].as_str(), codes[1].as_str(), codes[0].as_str()]);

        let bob = mgr.list_for_user(2, 10).await.unwrap();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].status, GameStatus::Active);

        // Limits are clamped to at least one game.
        assert_eq!(mgr.list_for_user(1, 0).await.unwrap().len(), 1);
    }
}
