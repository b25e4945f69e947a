//! Session persistence. The session layer talks to a `SessionStore`; Postgres backs
//! it in production, an in-memory map backs it when no database is configured.

pub mod games;
pub mod memory;
pub mod pool;

use async_trait::async_trait;

use crate::session::model::{GameSession, MoveRecord};

pub use games::PgSessionStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Duplicate key: {0}")]
    Duplicate(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a session together with its full move list.
    async fn load_session(&self, code: &str) -> Result<Option<GameSession>, StoreError>;

    async fn session_exists(&self, code: &str) -> Result<bool, StoreError>;

    async fn insert_session(&self, session: &GameSession) -> Result<(), StoreError>;

    /// Overwrite the mutable session fields (seats, status, clocks, position).
    async fn save_session(&self, session: &GameSession) -> Result<(), StoreError>;

    /// Append `record` and save `session` as one unit.
    async fn record_move(&self, session: &GameSession, record: &MoveRecord) -> Result<(), StoreError>;

    /// Up to `limit` sessions with `user_id` in either seat, newest first, moves included.
    async fn list_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<GameSession>, StoreError>;
}
