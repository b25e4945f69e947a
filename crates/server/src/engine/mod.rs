//! Computer opponent. The session layer only sees `MoveEngine`; Stockfish is the
//! production implementation.

pub mod stockfish;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use stockfish::StockfishService;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine process error: {0}")]
    Process(String),

    #[error("Engine timed out")]
    Timeout,

    #[error("Engine returned no move")]
    NoMove,
}

/// Strength presets for games against the computer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotDifficulty {
    Beginner,
    Easy,
    #[default]
    Medium,
    Hard,
    Expert,
    Master,
}

/// UCI settings behind one difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineSettings {
    pub skill_level: u8,
    pub elo: u32,
    /// Seconds per move
    pub move_time: f64,
    pub depth: u8,
}

impl BotDifficulty {
    pub const ALL: [BotDifficulty; 6] = [
        BotDifficulty::Beginner,
        BotDifficulty::Easy,
        BotDifficulty::Medium,
        BotDifficulty::Hard,
        BotDifficulty::Expert,
        BotDifficulty::Master,
    ];

    pub fn settings(self) -> EngineSettings {
        let (skill_level, elo, move_time, depth) = match self {
            BotDifficulty::Beginner => (1, 800, 0.1, 5),
            BotDifficulty::Easy => (5, 1000, 0.2, 8),
            BotDifficulty::Medium => (10, 1400, 0.3, 12),
            BotDifficulty::Hard => (15, 1800, 0.5, 15),
            BotDifficulty::Expert => (18, 2200, 1.0, 18),
            BotDifficulty::Master => (20, 2800, 2.0, 20),
        };
        EngineSettings { skill_level, elo, move_time, depth }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BotDifficulty::Beginner => "beginner",
            BotDifficulty::Easy => "easy",
            BotDifficulty::Medium => "medium",
            BotDifficulty::Hard => "hard",
            BotDifficulty::Expert => "expert",
            BotDifficulty::Master => "master",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == value)
    }

    pub fn description(self) -> &'static str {
        match self {
            BotDifficulty::Beginner => "Just learning the moves",
            BotDifficulty::Easy => "Casual player",
            BotDifficulty::Medium => "Club player",
            BotDifficulty::Hard => "Strong club player",
            BotDifficulty::Expert => "Expert level",
            BotDifficulty::Master => "Full engine strength",
        }
    }
}

#[async_trait]
pub trait MoveEngine: Send + Sync {
    /// Best move for the side to move in `fen`, in coordinate notation.
    async fn best_move(&self, fen: &str, difficulty: BotDifficulty) -> Result<String, EngineError>;
}
