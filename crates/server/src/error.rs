use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::session::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Not authenticated")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(msg) => AppError::NotFound(msg),
            SessionError::InvalidState(msg) | SessionError::Validation(msg) => AppError::BadRequest(msg),
            SessionError::Forbidden(msg) => AppError::Forbidden(msg),
            SessionError::Conflict(msg) => AppError::Conflict(msg),
            SessionError::Unavailable(msg) => AppError::Unavailable(msg),
            SessionError::Storage(e) => AppError::Internal(e.to_string()),
            SessionError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Not authenticated".to_string()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(json!({ "detail": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors_map_to_status() {
        let cases = [
            (SessionError::not_found(), StatusCode::NOT_FOUND),
            (SessionError::InvalidState("x".into()), StatusCode::BAD_REQUEST),
            (SessionError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (SessionError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (SessionError::Conflict("x".into()), StatusCode::CONFLICT),
            (SessionError::Unavailable("x".into()), StatusCode::SERVICE_UNAVAILABLE),
            (SessionError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
