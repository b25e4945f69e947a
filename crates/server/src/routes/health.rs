use axum::{Extension, Json};
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;

use crate::rooms::RoomRegistry;
use crate::session::SessionManager;

/// GET /health
pub async fn health_check(
    Extension(sessions): Extension<Arc<SessionManager>>,
    Extension(rooms): Extension<Arc<RoomRegistry>>,
) -> Json<JsonValue> {
    Json(json!({
        "status": "ok",
        "sessions": sessions.session_count().await,
        "rooms": rooms.room_count().await,
        "engine": sessions.has_engine(),
    }))
}
