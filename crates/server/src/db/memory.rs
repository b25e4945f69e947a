use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{SessionStore, StoreError};
use crate::session::model::{GameSession, MoveRecord, Occupant};

/// Process-local store used when `DATABASE_URL` is unset and in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<String, GameSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_session(&self, code: &str) -> Result<Option<GameSession>, StoreError> {
        Ok(self.sessions.read().await.get(code).cloned())
    }

    async fn session_exists(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.read().await.contains_key(code))
    }

    async fn insert_session(&self, session: &GameSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.code) {
            return Err(StoreError::Duplicate(session.code.clone()));
        }
        sessions.insert(session.code.clone(), session.clone());
        Ok(())
    }

    async fn save_session(&self, session: &GameSession) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.code.clone(), session.clone());
        Ok(())
    }

    async fn record_move(&self, session: &GameSession, record: &MoveRecord) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let stored_moves = sessions.get(&session.code).map(|s| s.moves.len()).unwrap_or(0);
        if record.move_number as usize != stored_moves + 1 {
            return Err(StoreError::Duplicate(format!(
                "{} move {}",
                record.game_code, record.move_number
            )));
        }
        sessions.insert(session.code.clone(), session.clone());
        Ok(())
    }

    async fn list_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<GameSession>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut games: Vec<GameSession> = sessions
            .values()
            .filter(|s| {
                [&s.white, &s.black]
                    .into_iter()
                    .any(|o| matches!(o, Occupant::Registered(u) if u.id == user_id))
            })
            .cloned()
            .collect();
        games.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        games.truncate(limit);
        Ok(games)
    }
}
