use std::sync::Arc;

use axum::{extract::Path, Extension, Json};
use chess_core::Side;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::MaybeAuthUser;
use crate::engine::BotDifficulty;
use crate::error::AppError;
use crate::rooms::RoomRegistry;
use crate::routes::game_ws::spawn_engine_reply;
use crate::routes::games::{GuestTokenRequest, SeatResponse};
use crate::session::{ColorChoice, MoveOutcome, SessionManager, TimeControl};

#[derive(Serialize)]
pub struct DifficultyInfo {
    pub id: BotDifficulty,
    pub description: &'static str,
    pub elo: u32,
    pub skill_level: u8,
    pub depth: u8,
    pub move_time: f64,
}

#[derive(Deserialize, Validate)]
pub struct CreateBotGameRequest {
    pub difficulty: Option<BotDifficulty>,
    pub color: Option<ColorChoice>,
    pub time_control: Option<TimeControl>,
    #[validate(length(min = 1, max = 50))]
    pub guest_name: Option<String>,
}

/// GET /api/bot-games/difficulties
pub async fn list_difficulties() -> Json<Vec<DifficultyInfo>> {
    Json(
        BotDifficulty::ALL
            .into_iter()
            .map(|d| {
                let settings = d.settings();
                DifficultyInfo {
                    id: d,
                    description: d.description(),
                    elo: settings.elo,
                    skill_level: settings.skill_level,
                    depth: settings.depth,
                    move_time: settings.move_time,
                }
            })
            .collect(),
    )
}

/// POST /api/bot-games
pub async fn create_bot_game(
    Extension(sessions): Extension<Arc<SessionManager>>,
    Extension(rooms): Extension<Arc<RoomRegistry>>,
    user: MaybeAuthUser,
    Json(body): Json<CreateBotGameRequest>,
) -> Result<Json<SeatResponse>, AppError> {
    body.validate()?;

    let requester = user.identity_or_guest(body.guest_name, None);
    let (game, seat) = sessions
        .create_engine_session(
            &requester,
            body.difficulty.unwrap_or_default(),
            body.color.unwrap_or_default(),
            body.time_control.unwrap_or_default(),
        )
        .await?;

    // Engine has white: it opens.
    if seat.color == Side::Black {
        spawn_engine_reply(sessions, rooms, game.code.clone());
    }

    Ok(Json(SeatResponse::new(game, seat)))
}

/// POST /api/bot-games/{code}/engine-move
///
/// Ask the engine again after a failed reply left it to move. Waits for the move.
pub async fn request_engine_move(
    Extension(sessions): Extension<Arc<SessionManager>>,
    Path(code): Path<String>,
    user: MaybeAuthUser,
    Json(body): Json<GuestTokenRequest>,
) -> Result<Json<MoveOutcome>, AppError> {
    let requester = user.identity_or_guest(None, body.guest_token);
    if sessions.player_color(&code, &requester).await?.is_none() {
        return Err(AppError::Forbidden("You are not a player in this game".into()));
    }

    Ok(Json(sessions.play_engine_move(&code).await?))
}
