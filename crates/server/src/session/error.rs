use chess_core::RulesError;

use crate::db::StoreError;

/// Failures surfaced by session operations. Each variant maps to one HTTP status
/// and one websocket error message.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    pub fn not_found() -> Self {
        SessionError::NotFound("Game not found".into())
    }

    /// Short machine-readable kind, used in logs.
    pub fn reason_code(&self) -> &'static str {
        match self {
            SessionError::NotFound(_) => "not_found",
            SessionError::InvalidState(_) => "invalid_state",
            SessionError::Forbidden(_) => "forbidden",
            SessionError::Validation(_) => "validation",
            SessionError::Conflict(_) => "conflict",
            SessionError::Unavailable(_) => "unavailable",
            SessionError::Storage(_) => "storage",
            SessionError::Internal(_) => "internal",
        }
    }
}

impl From<RulesError> for SessionError {
    fn from(err: RulesError) -> Self {
        match err {
            RulesError::InvalidMoveFormat | RulesError::IllegalMove => {
                SessionError::Validation(err.to_string())
            }
            // A stored position that does not parse is our fault, not the caller's.
            RulesError::InvalidPosition(msg) => SessionError::Internal(msg),
        }
    }
}
