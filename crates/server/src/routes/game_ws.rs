//! Realtime game socket. Each connection gets a reader loop (this task) and a writer
//! task draining the connection's outbound queue in the room registry.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Path, Query},
    response::Response,
    Extension,
};
use chess_core::Side;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::config::Config;
use crate::error::AppError;
use crate::protocol::{ClientMessage, ServerEvent};
use crate::rooms::{ConnectionId, Participant, RoomRegistry};
use crate::session::{GameStatus, GuestCredentials, Identity, SessionError, SessionManager};

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    /// JWT for registered players
    pub token: Option<String>,
    pub guest_token: Option<String>,
    /// Color a guest claims; must match the seat bound to `guest_token`
    pub color: Option<Side>,
}

/// GET /api/games/{code}/ws
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(code): Path<String>,
    Query(params): Query<WsParams>,
    Extension(sessions): Extension<Arc<SessionManager>>,
    Extension(rooms): Extension<Arc<RoomRegistry>>,
    Extension(config): Extension<Config>,
) -> Result<Response, AppError> {
    let session = sessions.snapshot(&code).await?;
    let identity = resolve_identity(&params, &config)?;

    let color = identity.as_ref().and_then(|id| session.player_color(id));
    if params.guest_token.is_some() && color.is_none() {
        return Err(AppError::Forbidden("Guest credentials do not match a seat".into()));
    }

    let participant = Participant {
        player_id: identity.as_ref().and_then(Identity::player_id),
        color,
    };

    Ok(ws.on_upgrade(move |socket| {
        handle_socket(socket, code, identity.filter(|_| color.is_some()), participant, sessions, rooms)
    }))
}

fn resolve_identity(params: &WsParams, config: &Config) -> Result<Option<Identity>, AppError> {
    if let Some(token) = &params.token {
        let user = AuthUser::from_token(token, config).ok_or(AppError::Unauthorized)?;
        return Ok(Some(user.identity()));
    }
    if let Some(guest_token) = &params.guest_token {
        return Ok(Some(Identity::Guest(GuestCredentials {
            name: None,
            token: Some(guest_token.clone()),
            asserted_color: params.color,
        })));
    }
    Ok(None)
}

/// `identity` is `None` for spectators.
async fn handle_socket(
    socket: WebSocket,
    code: String,
    identity: Option<Identity>,
    participant: Participant,
    sessions: Arc<SessionManager>,
    rooms: Arc<RoomRegistry>,
) {
    let (mut sink, mut stream) = socket.split();
    let (conn_id, mut outbound) = rooms.connect(&code, participant.clone()).await;

    tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    info!(code = %code, conn_id, color = ?participant.color, "socket connected");
    announce_arrival(&sessions, &rooms, &code, conn_id, &participant).await;

    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(t) => t.to_string(),
            Message::Close(_) => break,
            _ => continue,
        };

        let client_msg: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                rooms
                    .send_to(conn_id, &ServerEvent::error(format!("Invalid message: {e}")))
                    .await;
                continue;
            }
        };
        debug!(code = %code, conn_id, message = ?client_msg, "client message");

        dispatch(&sessions, &rooms, &code, conn_id, identity.as_ref(), &participant, client_msg).await;
    }

    if let Some((_, who)) = rooms.disconnect(conn_id).await {
        rooms
            .broadcast_to_all(
                &code,
                &ServerEvent::PlayerDisconnected {
                    player_id: who.player_id,
                    color: who.color,
                },
            )
            .await;
    }
    info!(code = %code, conn_id, "socket disconnected");
}

/// Tell the room a seated player arrived, and start the game once both sides are here.
/// An engine turn left hanging by a failed reply is retried on arrival.
async fn announce_arrival(
    sessions: &Arc<SessionManager>,
    rooms: &Arc<RoomRegistry>,
    code: &str,
    conn_id: ConnectionId,
    participant: &Participant,
) {
    let Some(color) = participant.color else {
        return;
    };
    let Ok(session) = sessions.snapshot(code).await else {
        return;
    };
    if session.status != GameStatus::Active {
        return;
    }

    rooms
        .broadcast_to_others(
            code,
            conn_id,
            &ServerEvent::PlayerJoined {
                player: session.occupant(color).player_info(),
                color,
            },
        )
        .await;

    let present = rooms.colors_present(code).await;
    let opponent_here = present.contains(&color.opposite())
        || session.engine_seat().is_some_and(|(side, _)| side == color.opposite());
    if present.contains(&color) && opponent_here {
        rooms
            .broadcast_to_all(
                code,
                &ServerEvent::GameStart {
                    white_player: session.white.player_info(),
                    black_player: session.black.player_info(),
                    fen: session.current_fen.clone(),
                    white_time: session.white_time_remaining,
                    black_time: session.black_time_remaining,
                },
            )
            .await;
    }

    if matches!(sessions.engine_to_move(code).await, Ok(true)) {
        spawn_engine_reply(sessions.clone(), rooms.clone(), code.to_string());
    }
}

async fn dispatch(
    sessions: &Arc<SessionManager>,
    rooms: &Arc<RoomRegistry>,
    code: &str,
    conn_id: ConnectionId,
    identity: Option<&Identity>,
    participant: &Participant,
    message: ClientMessage,
) {
    let result = match message {
        ClientMessage::Move { mv, time_spent } => {
            let Some(actor) = identity else {
                return reject(rooms, conn_id, "Spectators cannot move").await;
            };
            sessions
                .submit_move(code, actor, &mv, time_spent)
                .await
                .map(|outcome| {
                    if outcome.engine_to_move {
                        spawn_engine_reply(sessions.clone(), rooms.clone(), code.to_string());
                    }
                })
        }
        ClientMessage::Resign => {
            let Some(actor) = identity else {
                return reject(rooms, conn_id, "Spectators cannot resign").await;
            };
            sessions.resign_session(code, actor).await.map(|_| ())
        }
        ClientMessage::Timeout { color } => {
            if participant.color.is_none() {
                return reject(rooms, conn_id, "Spectators cannot signal timeouts").await;
            }
            sessions.timeout_session(code, color).await.map(|_| ())
        }
    };

    if let Err(e) = result {
        debug!(code, conn_id, reason = e.reason_code(), error = %e, "message rejected");
        reject(rooms, conn_id, &e.to_string()).await;
    }
}

async fn reject(rooms: &RoomRegistry, conn_id: ConnectionId, message: &str) {
    rooms.send_to(conn_id, &ServerEvent::error(message)).await;
}

/// Let the engine answer in the background so the human can still act meanwhile.
/// The committed reply reaches the room through the session publisher.
pub(crate) fn spawn_engine_reply(sessions: Arc<SessionManager>, rooms: Arc<RoomRegistry>, code: String) {
    tokio::spawn(async move {
        match sessions.play_engine_move(&code).await {
            Ok(_) => {}
            Err(SessionError::Unavailable(msg)) => {
                rooms.broadcast_to_all(&code, &ServerEvent::error(msg)).await;
            }
            Err(e) => debug!(code = %code, error = %e, "engine reply dropped"),
        }
    });
}
