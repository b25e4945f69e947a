//! Realtime wire messages for `/api/games/{code}/ws`.

use chess_core::Side;
use serde::{Deserialize, Serialize};

use crate::session::{GameResult, MoveOutcome, PlayerInfo};

/// Server → Client messages
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Move {
        move_uci: String,
        move_san: String,
        fen: String,
        white_time: u32,
        black_time: u32,
        is_white_turn: bool,
    },
    GameOver {
        result: GameResult,
        reason: String,
    },
    PlayerJoined {
        player: Option<PlayerInfo>,
        color: Side,
    },
    GameStart {
        white_player: Option<PlayerInfo>,
        black_player: Option<PlayerInfo>,
        fen: String,
        white_time: u32,
        black_time: u32,
    },
    PlayerDisconnected {
        player_id: Option<i64>,
        color: Option<Side>,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Move { .. } => "move",
            ServerEvent::GameOver { .. } => "game_over",
            ServerEvent::PlayerJoined { .. } => "player_joined",
            ServerEvent::GameStart { .. } => "game_start",
            ServerEvent::PlayerDisconnected { .. } => "player_disconnected",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// The `move` event, followed by `game_over` when the move ended the game.
    pub fn from_outcome(outcome: &MoveOutcome) -> Vec<ServerEvent> {
        let mut events = vec![ServerEvent::Move {
            move_uci: outcome.record.move_uci.clone(),
            move_san: outcome.record.move_san.clone(),
            fen: outcome.record.fen_after.clone(),
            white_time: outcome.white_time,
            black_time: outcome.black_time,
            is_white_turn: outcome.is_white_turn,
        }];
        if let (Some(result), Some(reason)) = (outcome.result, outcome.reason()) {
            events.push(ServerEvent::GameOver {
                result,
                reason: reason.to_string(),
            });
        }
        events
    }
}

/// Client → Server messages
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Move {
        #[serde(rename = "move")]
        mv: String,
        /// Milliseconds spent thinking
        #[serde(default)]
        time_spent: u64,
    },
    Resign,
    Timeout {
        color: Side,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_messages_parse() {
        let mv: ClientMessage =
            serde_json::from_str(r#"{"type":"move","move":"e2e4","time_spent":4200}"#).unwrap();
        assert_eq!(mv, ClientMessage::Move { mv: "e2e4".into(), time_spent: 4200 });

        let mv: ClientMessage = serde_json::from_str(r#"{"type":"move","move":"e7e8q"}"#).unwrap();
        assert_eq!(mv, ClientMessage::Move { mv: "e7e8q".into(), time_spent: 0 });

        let resign: ClientMessage = serde_json::from_str(r#"{"type":"resign"}"#).unwrap();
        assert_eq!(resign, ClientMessage::Resign);

        let timeout: ClientMessage =
            serde_json::from_str(r#"{"type":"timeout","color":"black"}"#).unwrap();
        assert_eq!(timeout, ClientMessage::Timeout { color: Side::Black });

        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"draw_offer"}"#).is_err());
    }

    #[test]
    fn test_server_event_shape() {
        let event = ServerEvent::GameOver {
            result: GameResult::WhiteWin,
            reason: "resignation".into(),
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "game_over", "result": "white_win", "reason": "resignation"})
        );

        let event = ServerEvent::PlayerDisconnected { player_id: None, color: Some(Side::White) };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"type": "player_disconnected", "player_id": null, "color": "white"})
        );
        assert_eq!(event.kind(), "player_disconnected");
    }
}
