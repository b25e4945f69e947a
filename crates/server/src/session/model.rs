use chrono::{DateTime, Utc};
use chess_core::{Side, STARTING_FEN};
use serde::{Deserialize, Serialize};

use crate::engine::BotDifficulty;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Waiting,   // Waiting for opponent
    Active,    // Game in progress
    Completed, // Game finished
    Abandoned, // Cancelled before it started
}

impl GameStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Waiting => "waiting",
            GameStatus::Active => "active",
            GameStatus::Completed => "completed",
            GameStatus::Abandoned => "abandoned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "waiting" => Some(GameStatus::Waiting),
            "active" => Some(GameStatus::Active),
            "completed" => Some(GameStatus::Completed),
            "abandoned" => Some(GameStatus::Abandoned),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, GameStatus::Completed | GameStatus::Abandoned)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameResult {
    WhiteWin,
    BlackWin,
    Draw,
    Abandoned,
}

impl GameResult {
    pub fn win_for(side: Side) -> Self {
        match side {
            Side::White => GameResult::WhiteWin,
            Side::Black => GameResult::BlackWin,
        }
    }

    pub fn winner(self) -> Option<Side> {
        match self {
            GameResult::WhiteWin => Some(Side::White),
            GameResult::BlackWin => Some(Side::Black),
            GameResult::Draw | GameResult::Abandoned => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameResult::WhiteWin => "white_win",
            GameResult::BlackWin => "black_win",
            GameResult::Draw => "draw",
            GameResult::Abandoned => "abandoned",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "white_win" => Some(GameResult::WhiteWin),
            "black_win" => Some(GameResult::BlackWin),
            "draw" => Some(GameResult::Draw),
            "abandoned" => Some(GameResult::Abandoned),
            _ => None,
        }
    }

    /// PGN result token.
    pub fn pgn_token(self) -> &'static str {
        match self {
            GameResult::WhiteWin => "1-0",
            GameResult::BlackWin => "0-1",
            GameResult::Draw => "1/2-1/2",
            GameResult::Abandoned => "*",
        }
    }
}

/// Time-control presets offered to players.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeControl {
    #[serde(rename = "bullet_1")]
    Bullet1, // 1+0
    #[serde(rename = "bullet_2")]
    Bullet2, // 2+1
    #[serde(rename = "blitz_3")]
    Blitz3, // 3+0
    #[default]
    #[serde(rename = "blitz_5")]
    Blitz5, // 5+0
    #[serde(rename = "rapid_10")]
    Rapid10, // 10+0
    #[serde(rename = "rapid_15")]
    Rapid15, // 15+10
}

impl TimeControl {
    pub fn initial_secs(self) -> u32 {
        match self {
            TimeControl::Bullet1 => 60,
            TimeControl::Bullet2 => 120,
            TimeControl::Blitz3 => 180,
            TimeControl::Blitz5 => 300,
            TimeControl::Rapid10 => 600,
            TimeControl::Rapid15 => 900,
        }
    }

    pub fn increment_secs(self) -> u32 {
        match self {
            TimeControl::Bullet2 => 1,
            TimeControl::Rapid15 => 10,
            _ => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeControl::Bullet1 => "bullet_1",
            TimeControl::Bullet2 => "bullet_2",
            TimeControl::Blitz3 => "blitz_3",
            TimeControl::Blitz5 => "blitz_5",
            TimeControl::Rapid10 => "rapid_10",
            TimeControl::Rapid15 => "rapid_15",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "bullet_1" => Some(TimeControl::Bullet1),
            "bullet_2" => Some(TimeControl::Bullet2),
            "blitz_3" => Some(TimeControl::Blitz3),
            "blitz_5" => Some(TimeControl::Blitz5),
            "rapid_10" => Some(TimeControl::Rapid10),
            "rapid_15" => Some(TimeControl::Rapid15),
            _ => None,
        }
    }

    /// PGN `TimeControl` tag value, e.g. `900+10`.
    pub fn pgn_label(self) -> String {
        format!("{}+{}", self.initial_secs(), self.increment_secs())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    #[default]
    White,
    Black,
    Random,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: i64,
    pub username: String,
}

/// Who sits on one side of the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Occupant {
    Empty,
    Registered(UserRef),
    /// Anonymous player; `token` is the server-minted seat credential.
    Guest { name: String, token: String },
    Engine(BotDifficulty),
}

impl Occupant {
    pub fn is_empty(&self) -> bool {
        matches!(self, Occupant::Empty)
    }

    pub fn player_info(&self) -> Option<PlayerInfo> {
        match self {
            Occupant::Empty => None,
            Occupant::Registered(user) => Some(PlayerInfo {
                id: Some(user.id),
                username: user.username.clone(),
                kind: PlayerKind::Registered,
            }),
            Occupant::Guest { name, .. } => Some(PlayerInfo {
                id: None,
                username: name.clone(),
                kind: PlayerKind::Guest,
            }),
            Occupant::Engine(difficulty) => Some(PlayerInfo {
                id: None,
                username: format!("Stockfish ({})", difficulty.as_str()),
                kind: PlayerKind::Engine,
            }),
        }
    }

    pub fn display_name(&self) -> String {
        self.player_info()
            .map(|p| p.username)
            .unwrap_or_else(|| "?".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerKind {
    Registered,
    Guest,
    Engine,
}

/// Public player descriptor sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub id: Option<i64>,
    pub username: String,
    pub kind: PlayerKind,
}

/// Credentials presented by a caller. Registered users come from a verified JWT;
/// guests present the seat token minted for them at create/join time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Registered(UserRef),
    Guest(GuestCredentials),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestCredentials {
    pub name: Option<String>,
    pub token: Option<String>,
    pub asserted_color: Option<Side>,
}

impl Identity {
    pub fn guest(name: Option<String>, token: Option<String>) -> Self {
        Identity::Guest(GuestCredentials {
            name,
            token,
            asserted_color: None,
        })
    }

    pub fn player_id(&self) -> Option<i64> {
        match self {
            Identity::Registered(user) => Some(user.id),
            Identity::Guest(_) => None,
        }
    }

    pub fn guest_token(&self) -> Option<&str> {
        match self {
            Identity::Registered(_) => None,
            Identity::Guest(creds) => creds.token.as_deref(),
        }
    }
}

/// The caller's place in a session after create/join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Seat {
    pub color: Side,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_token: Option<String>,
}

/// One accepted move. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    pub game_code: String,
    pub move_number: u32,
    pub move_uci: String,
    pub move_san: String,
    pub fen_after: String,
    /// Milliseconds, as reported by the client
    pub time_spent: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    pub code: String,
    pub status: GameStatus,
    pub result: Option<GameResult>,
    pub end_reason: Option<String>,
    pub white: Occupant,
    pub black: Occupant,
    pub creator_color: Side,
    pub time_control: TimeControl,
    pub white_time_remaining: u32,
    pub black_time_remaining: u32,
    pub current_fen: String,
    pub moves: Vec<MoveRecord>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_move_at: Option<DateTime<Utc>>,
}

impl GameSession {
    /// A fresh Waiting session with the creator seated on `creator_color`.
    pub fn new(
        code: String,
        creator_color: Side,
        creator: Occupant,
        time_control: TimeControl,
        now: DateTime<Utc>,
    ) -> Self {
        let (white, black) = match creator_color {
            Side::White => (creator, Occupant::Empty),
            Side::Black => (Occupant::Empty, creator),
        };
        let initial = time_control.initial_secs();

        Self {
            code,
            status: GameStatus::Waiting,
            result: None,
            end_reason: None,
            white,
            black,
            creator_color,
            time_control,
            white_time_remaining: initial,
            black_time_remaining: initial,
            current_fen: STARTING_FEN.to_string(),
            moves: Vec::new(),
            created_at: now,
            started_at: None,
            ended_at: None,
            last_move_at: None,
        }
    }

    pub fn occupant(&self, side: Side) -> &Occupant {
        match side {
            Side::White => &self.white,
            Side::Black => &self.black,
        }
    }

    pub fn seat(&mut self, side: Side, occupant: Occupant) {
        match side {
            Side::White => self.white = occupant,
            Side::Black => self.black = occupant,
        }
    }

    pub fn remaining(&self, side: Side) -> u32 {
        match side {
            Side::White => self.white_time_remaining,
            Side::Black => self.black_time_remaining,
        }
    }

    pub fn set_remaining(&mut self, side: Side, secs: u32) {
        match side {
            Side::White => self.white_time_remaining = secs,
            Side::Black => self.black_time_remaining = secs,
        }
    }

    pub fn is_white_turn(&self) -> bool {
        self.current_fen.split_whitespace().nth(1) == Some("w")
    }

    /// The side the engine plays, if this is a game against the computer.
    pub fn engine_seat(&self) -> Option<(Side, BotDifficulty)> {
        [Side::White, Side::Black]
            .into_iter()
            .find_map(|side| match self.occupant(side) {
                Occupant::Engine(difficulty) => Some((side, *difficulty)),
                _ => None,
            })
    }

    /// Which color `identity` plays, if any.
    pub fn player_color(&self, identity: &Identity) -> Option<Side> {
        match identity {
            Identity::Registered(user) => [Side::White, Side::Black].into_iter().find(|side| {
                matches!(self.occupant(*side), Occupant::Registered(u) if u.id == user.id)
            }),
            Identity::Guest(creds) => {
                let token = creds.token.as_deref()?;
                let side = [Side::White, Side::Black].into_iter().find(|side| {
                    matches!(self.occupant(*side), Occupant::Guest { token: t, .. } if t == token)
                })?;
                match creds.asserted_color {
                    Some(asserted) if asserted != side => None,
                    _ => Some(side),
                }
            }
        }
    }

    /// Waiting → Active. `started_at` is stamped only the first time.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.status = GameStatus::Active;
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// Enter a terminal status. Callers check the current status first.
    pub fn finish(&mut self, status: GameStatus, result: GameResult, reason: &str, now: DateTime<Utc>) {
        debug_assert!(status.is_terminal() && !self.status.is_terminal());
        self.status = status;
        self.result = Some(result);
        self.end_reason = Some(reason.to_string());
        if self.ended_at.is_none() {
            self.ended_at = Some(now);
        }
    }

    /// Every FEN reached so far, starting position first.
    pub fn history(&self) -> Vec<&str> {
        std::iter::once(STARTING_FEN)
            .chain(self.moves.iter().map(|m| m.fen_after.as_str()))
            .collect()
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            code: self.code.clone(),
            status: self.status,
            result: self.result,
            end_reason: self.end_reason.clone(),
            current_fen: self.current_fen.clone(),
            time_control: self.time_control,
            white_time_remaining: self.white_time_remaining,
            black_time_remaining: self.black_time_remaining,
            white_player: self.white.player_info(),
            black_player: self.black.player_info(),
            creator_color: self.creator_color,
            is_white_turn: self.is_white_turn(),
            move_count: self.moves.len(),
            created_at: self.created_at,
            started_at: self.started_at,
            ended_at: self.ended_at,
            last_move_at: self.last_move_at,
        }
    }
}

/// Session descriptor returned by the HTTP API. Never carries seat tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionView {
    pub code: String,
    pub status: GameStatus,
    pub result: Option<GameResult>,
    pub end_reason: Option<String>,
    pub current_fen: String,
    pub time_control: TimeControl,
    pub white_time_remaining: u32,
    pub black_time_remaining: u32,
    pub white_player: Option<PlayerInfo>,
    pub black_player: Option<PlayerInfo>,
    pub creator_color: Side,
    pub is_white_turn: bool,
    pub move_count: usize,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub last_move_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest(name: &str, token: &str) -> Occupant {
        Occupant::Guest {
            name: name.into(),
            token: token.into(),
        }
    }

    #[test]
    fn test_new_session_seats_creator() {
        let session = GameSession::new(
            "abcd1234".into(),
            Side::Black,
            guest("Ann", "tok-a"),
            TimeControl::Rapid15,
            Utc::now(),
        );
        assert_eq!(session.status, GameStatus::Waiting);
        assert!(session.white.is_empty());
        assert_eq!(session.black, guest("Ann", "tok-a"));
        assert_eq!(session.white_time_remaining, 900);
        assert_eq!(session.black_time_remaining, 900);
        assert!(session.is_white_turn());
        assert_eq!(session.history(), vec![STARTING_FEN]);
    }

    #[test]
    fn test_player_color_registered() {
        let user = UserRef { id: 7, username: "magnus".into() };
        let session = GameSession::new(
            "abcd1234".into(),
            Side::White,
            Occupant::Registered(user.clone()),
            TimeControl::Blitz5,
            Utc::now(),
        );
        assert_eq!(session.player_color(&Identity::Registered(user)), Some(Side::White));
        let stranger = UserRef { id: 8, username: "hikaru".into() };
        assert_eq!(session.player_color(&Identity::Registered(stranger)), None);
    }

    #[test]
    fn test_player_color_guest_requires_matching_token() {
        let mut session = GameSession::new(
            "abcd1234".into(),
            Side::White,
            guest("Ann", "tok-a"),
            TimeControl::Blitz5,
            Utc::now(),
        );
        session.seat(Side::Black, guest("Bob", "tok-b"));

        assert_eq!(
            session.player_color(&Identity::guest(None, Some("tok-b".into()))),
            Some(Side::Black)
        );
        assert_eq!(session.player_color(&Identity::guest(None, Some("nope".into()))), None);
        assert_eq!(session.player_color(&Identity::guest(Some("Bob".into()), None)), None);

        // A color assertion must agree with the seat bound to the token.
        let lying = Identity::Guest(GuestCredentials {
            name: None,
            token: Some("tok-b".into()),
            asserted_color: Some(Side::White),
        });
        assert_eq!(session.player_color(&lying), None);
    }

    #[test]
    fn test_start_and_finish_stamp_once() {
        let t0 = Utc::now();
        let mut session = GameSession::new(
            "abcd1234".into(),
            Side::White,
            guest("Ann", "tok-a"),
            TimeControl::Blitz5,
            t0,
        );
        session.start(t0);
        session.start(t0 + chrono::Duration::seconds(5));
        assert_eq!(session.started_at, Some(t0));

        session.finish(GameStatus::Completed, GameResult::Draw, "stalemate", t0);
        assert_eq!(session.result, Some(GameResult::Draw));
        assert_eq!(session.ended_at, Some(t0));
    }

    #[test]
    fn test_time_control_serde_names() {
        assert_eq!(serde_json::to_string(&TimeControl::Bullet2).unwrap(), "\"bullet_2\"");
        let tc: TimeControl = serde_json::from_str("\"rapid_15\"").unwrap();
        assert_eq!(tc, TimeControl::Rapid15);
        assert_eq!(tc.pgn_label(), "900+10");
        assert_eq!(TimeControl::parse(tc.as_str()), Some(tc));
    }

    #[test]
    fn test_engine_seat() {
        let mut session = GameSession::new(
            "abcd1234".into(),
            Side::White,
            guest("Ann", "tok-a"),
            TimeControl::Blitz5,
            Utc::now(),
        );
        assert_eq!(session.engine_seat(), None);
        session.seat(Side::Black, Occupant::Engine(BotDifficulty::Hard));
        assert_eq!(session.engine_seat(), Some((Side::Black, BotDifficulty::Hard)));
        assert_eq!(
            session.black.player_info().unwrap().username,
            "Stockfish (hard)"
        );
    }
}
