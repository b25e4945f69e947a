//! Domain events emitted after a session change has been persisted. Consumers
//! (stats, achievements, notifications) plug in as `EventSink`s.

use async_trait::async_trait;
use chess_core::Side;
use serde::Serialize;

use super::model::GameResult;
use super::pipeline::MoveOutcome;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    GameFinished {
        code: String,
        result: GameResult,
        reason: String,
    },
    /// Only for registered winners.
    GameWon {
        user_id: i64,
        code: String,
        color: Side,
    },
    CheckmateDelivered {
        user_id: i64,
        code: String,
    },
}

pub trait EventSink: Send + Sync {
    fn emit(&self, event: &GameEvent);
}

/// Live delivery of committed changes to whoever watches a session. Called while
/// the session lock is still held, so watchers see changes in commit order.
#[async_trait]
pub trait SessionPublisher: Send + Sync {
    /// A move was committed; `outcome.result` is set when it ended the game.
    async fn move_committed(&self, code: &str, outcome: &MoveOutcome);

    /// The game ended without a move (resignation, timeout, abandonment).
    async fn game_ended(&self, code: &str, result: GameResult, reason: &str);
}

/// Writes every event to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &GameEvent) {
        match event {
            GameEvent::GameFinished { code, result, reason } => {
                tracing::info!(code = %code, result = result.as_str(), reason = %reason, "game finished");
            }
            GameEvent::GameWon { user_id, code, color } => {
                tracing::info!(user_id, code = %code, color = %color, "game won");
            }
            GameEvent::CheckmateDelivered { user_id, code } => {
                tracing::info!(user_id, code = %code, "checkmate delivered");
            }
        }
    }
}
