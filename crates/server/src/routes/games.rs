use std::sync::Arc;

use axum::{
    extract::{Path, Query},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use chess_core::Side;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use validator::Validate;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::error::AppError;
use crate::rooms::RoomRegistry;
use crate::routes::game_ws::spawn_engine_reply;
use crate::session::{
    ColorChoice, MoveOutcome, MoveRecord, Seat, SessionManager, SessionView, TimeControl,
};

#[derive(Deserialize, Validate)]
pub struct CreateGameRequest {
    pub time_control: Option<TimeControl>,
    pub color: Option<ColorChoice>,
    #[validate(length(min = 1, max = 50))]
    pub guest_name: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct JoinGameRequest {
    #[validate(length(min = 1, max = 50))]
    pub guest_name: Option<String>,
    pub guest_token: Option<String>,
}

/// Body for guest-authenticated actions. Registered players send `{}`.
#[derive(Deserialize, Default)]
pub struct GuestTokenRequest {
    pub guest_token: Option<String>,
}

#[derive(Deserialize)]
pub struct MoveRequest {
    #[serde(rename = "move")]
    pub mv: String,
    #[serde(default)]
    pub time_spent: u64,
    pub guest_token: Option<String>,
}

#[derive(Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// A session plus the caller's seat in it.
#[derive(Serialize)]
pub struct SeatResponse {
    pub game: SessionView,
    pub color: Side,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_token: Option<String>,
}

impl SeatResponse {
    pub fn new(game: SessionView, seat: Seat) -> Self {
        Self {
            game,
            color: seat.color,
            guest_token: seat.guest_token,
        }
    }
}

/// POST /api/games
pub async fn create_game(
    Extension(sessions): Extension<Arc<SessionManager>>,
    user: MaybeAuthUser,
    Json(body): Json<CreateGameRequest>,
) -> Result<Json<SeatResponse>, AppError> {
    body.validate()?;

    let requester = user.identity_or_guest(body.guest_name, None);
    let (game, seat) = sessions
        .create_session(
            &requester,
            body.time_control.unwrap_or_default(),
            body.color.unwrap_or_default(),
        )
        .await?;

    Ok(Json(SeatResponse::new(game, seat)))
}

/// GET /api/games/mine
pub async fn list_my_games(
    Extension(sessions): Extension<Arc<SessionManager>>,
    user: AuthUser,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<SessionView>>, AppError> {
    let games = sessions
        .list_for_user(user.id, params.limit.unwrap_or(10))
        .await?;
    Ok(Json(games))
}

/// GET /api/games/{code}
pub async fn get_game(
    Extension(sessions): Extension<Arc<SessionManager>>,
    Path(code): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(sessions.get_session(&code).await?))
}

/// POST /api/games/{code}/join
pub async fn join_game(
    Extension(sessions): Extension<Arc<SessionManager>>,
    Path(code): Path<String>,
    user: MaybeAuthUser,
    Json(body): Json<JoinGameRequest>,
) -> Result<Json<SeatResponse>, AppError> {
    body.validate()?;

    let requester = user.identity_or_guest(body.guest_name, body.guest_token);
    let (game, seat) = sessions.join_session(&code, &requester).await?;

    Ok(Json(SeatResponse::new(game, seat)))
}

/// POST /api/games/{code}/move
pub async fn make_move(
    Extension(sessions): Extension<Arc<SessionManager>>,
    Extension(rooms): Extension<Arc<RoomRegistry>>,
    Path(code): Path<String>,
    user: MaybeAuthUser,
    Json(body): Json<MoveRequest>,
) -> Result<Json<MoveOutcome>, AppError> {
    let actor = user.identity_or_guest(None, body.guest_token);
    let outcome = sessions
        .submit_move(&code, &actor, &body.mv, body.time_spent)
        .await?;

    if outcome.engine_to_move {
        spawn_engine_reply(sessions, rooms, code);
    }
    Ok(Json(outcome))
}

/// POST /api/games/{code}/resign
pub async fn resign_game(
    Extension(sessions): Extension<Arc<SessionManager>>,
    Path(code): Path<String>,
    user: MaybeAuthUser,
    Json(body): Json<GuestTokenRequest>,
) -> Result<Json<JsonValue>, AppError> {
    let requester = user.identity_or_guest(None, body.guest_token);
    let game = sessions.resign_session(&code, &requester).await?;

    Ok(Json(json!({ "result": game.result })))
}

/// POST /api/games/{code}/abandon
pub async fn abandon_game(
    Extension(sessions): Extension<Arc<SessionManager>>,
    Path(code): Path<String>,
    user: MaybeAuthUser,
    Json(body): Json<GuestTokenRequest>,
) -> Result<Json<SessionView>, AppError> {
    let requester = user.identity_or_guest(None, body.guest_token);
    let game = sessions.abandon_session(&code, &requester).await?;

    Ok(Json(game))
}

/// GET /api/games/{code}/moves
pub async fn get_moves(
    Extension(sessions): Extension<Arc<SessionManager>>,
    Path(code): Path<String>,
) -> Result<Json<Vec<MoveRecord>>, AppError> {
    Ok(Json(sessions.moves(&code).await?))
}

/// GET /api/games/{code}/pgn
pub async fn get_pgn(
    Extension(sessions): Extension<Arc<SessionManager>>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let pgn = sessions.pgn(&code).await?;
    Ok(([(header::CONTENT_TYPE, "application/x-chess-pgn")], pgn))
}
