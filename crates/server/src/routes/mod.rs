pub mod bot_games;
pub mod game_ws;
pub mod games;
pub mod health;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::rooms::RoomRegistry;
use crate::session::SessionManager;

/// The full HTTP + websocket surface, with shared state attached as extensions.
pub fn router(sessions: Arc<SessionManager>, rooms: Arc<RoomRegistry>, config: Config) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health
        .route("/health", get(health::health_check))
        // Games
        .route("/api/games", post(games::create_game))
        .route("/api/games/mine", get(games::list_my_games))
        .route("/api/games/{code}", get(games::get_game))
        .route("/api/games/{code}/join", post(games::join_game))
        .route("/api/games/{code}/move", post(games::make_move))
        .route("/api/games/{code}/resign", post(games::resign_game))
        .route("/api/games/{code}/abandon", post(games::abandon_game))
        .route("/api/games/{code}/moves", get(games::get_moves))
        .route("/api/games/{code}/pgn", get(games::get_pgn))
        .route("/api/games/{code}/ws", get(game_ws::ws_handler))
        // Bot games
        .route("/api/bot-games/difficulties", get(bot_games::list_difficulties))
        .route("/api/bot-games", post(bot_games::create_bot_game))
        .route("/api/bot-games/{code}/engine-move", post(bot_games::request_engine_move))
        // Shared state
        .layer(Extension(sessions))
        .layer(Extension(rooms))
        .layer(Extension(config))
        .layer(cors)
}
