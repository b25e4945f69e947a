//! Rules engine wrapper. Positions travel as FEN strings so callers never hold a
//! `shakmaty` position across an await point.

use serde::{Deserialize, Serialize};
use shakmaty::{fen::Fen, san::San, CastlingMode, Chess, EnPassantMode, Position};

use crate::UciMove;

pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RulesError {
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Invalid move format")]
    InvalidMoveFormat,

    #[error("Illegal move")]
    IllegalMove,
}

/// Side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::White => "white",
            Side::Black => "black",
        }
    }

    pub fn parse(value: &str) -> Option<Side> {
        match value {
            "white" => Some(Side::White),
            "black" => Some(Side::Black),
            _ => None,
        }
    }
}

impl From<shakmaty::Color> for Side {
    fn from(color: shakmaty::Color) -> Self {
        match color {
            shakmaty::Color::White => Side::White,
            shakmaty::Color::Black => Side::Black,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of playing one legal move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    /// Normalized coordinate notation, e.g. `e7e8q`
    pub uci: String,
    /// SAN with check/mate suffix, e.g. `Qxf7#`
    pub san: String,
    pub fen_after: String,
}

/// Why a position ends the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    FiftyMoves,
    ThreefoldRepetition,
}

impl Termination {
    pub fn reason(self) -> &'static str {
        match self {
            Termination::Checkmate => "checkmate",
            Termination::Stalemate => "stalemate",
            Termination::InsufficientMaterial => "insufficient_material",
            Termination::FiftyMoves => "fifty_moves",
            Termination::ThreefoldRepetition => "threefold_repetition",
        }
    }

    pub fn is_decisive(self) -> bool {
        self == Termination::Checkmate
    }
}

/// The rules collaborator consumed by the move pipeline.
pub trait Rules: Send + Sync {
    fn side_to_move(&self, fen: &str) -> Result<Side, RulesError>;

    /// Parse coordinate notation without looking at a position.
    fn parse(&self, text: &str) -> Result<UciMove, RulesError>;

    fn is_legal(&self, fen: &str, mv: &UciMove) -> Result<bool, RulesError>;

    /// Play a legal move, returning its notations and the resulting position.
    fn apply(&self, fen: &str, mv: &UciMove) -> Result<AppliedMove, RulesError>;

    /// `history` is every FEN reached in the game so far, including `fen` itself.
    fn termination(&self, fen: &str, history: &[&str]) -> Result<Option<Termination>, RulesError>;
}

/// Standard chess via `shakmaty`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRules;

impl StandardRules {
    pub fn new() -> Self {
        Self
    }
}

fn position(fen: &str) -> Result<Chess, RulesError> {
    let fen: Fen = fen
        .parse()
        .map_err(|e: shakmaty::fen::ParseFenError| RulesError::InvalidPosition(e.to_string()))?;
    fen.into_position::<Chess>(CastlingMode::Standard)
        .map_err(|e| RulesError::InvalidPosition(e.to_string()))
}

/// Placement, side, castling and en passant: the fields that decide repetition.
fn repetition_key(fen: &str) -> String {
    fen.split_whitespace().take(4).collect::<Vec<_>>().join(" ")
}

impl Rules for StandardRules {
    fn side_to_move(&self, fen: &str) -> Result<Side, RulesError> {
        Ok(position(fen)?.turn().into())
    }

    fn parse(&self, text: &str) -> Result<UciMove, RulesError> {
        let text = text.trim();
        if text.len() < 4 || text.len() > 5 {
            return Err(RulesError::InvalidMoveFormat);
        }
        match text.parse::<UciMove>() {
            Ok(mv @ UciMove::Normal { .. }) => Ok(mv),
            // Drops (`P@e4`) and the null move (`0000`) are not board moves.
            _ => Err(RulesError::InvalidMoveFormat),
        }
    }

    fn is_legal(&self, fen: &str, mv: &UciMove) -> Result<bool, RulesError> {
        let pos = position(fen)?;
        Ok(mv.to_move(&pos).is_ok())
    }

    fn apply(&self, fen: &str, mv: &UciMove) -> Result<AppliedMove, RulesError> {
        let mut pos = position(fen)?;
        let legal_move = mv.to_move(&pos).map_err(|_| RulesError::IllegalMove)?;

        let mut san = San::from_move(&pos, legal_move).to_string();
        pos.play_unchecked(legal_move);
        if pos.is_checkmate() {
            san.push('#');
        } else if pos.is_check() {
            san.push('+');
        }

        Ok(AppliedMove {
            uci: mv.to_string(),
            san,
            fen_after: Fen::from_position(&pos, EnPassantMode::Legal).to_string(),
        })
    }

    fn termination(&self, fen: &str, history: &[&str]) -> Result<Option<Termination>, RulesError> {
        let pos = position(fen)?;

        if pos.is_checkmate() {
            return Ok(Some(Termination::Checkmate));
        }
        if pos.is_stalemate() {
            return Ok(Some(Termination::Stalemate));
        }
        if pos.is_insufficient_material() {
            return Ok(Some(Termination::InsufficientMaterial));
        }
        if pos.halfmoves() >= 100 {
            return Ok(Some(Termination::FiftyMoves));
        }

        let key = repetition_key(fen);
        let seen = history.iter().filter(|f| repetition_key(f) == key).count();
        if seen >= 3 {
            return Ok(Some(Termination::ThreefoldRepetition));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play_line(moves: &[&str]) -> Vec<String> {
        let rules = StandardRules::new();
        let mut fens = vec![STARTING_FEN.to_string()];
        for text in moves {
            let mv = rules.parse(text).unwrap();
            let applied = rules.apply(fens.last().unwrap(), &mv).unwrap();
            fens.push(applied.fen_after);
        }
        fens
    }

    #[test]
    fn test_side_to_move() {
        let rules = StandardRules::new();
        assert_eq!(rules.side_to_move(STARTING_FEN).unwrap(), Side::White);
        let fens = play_line(&["e2e4"]);
        assert_eq!(rules.side_to_move(&fens[1]).unwrap(), Side::Black);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let rules = StandardRules::new();
        assert_eq!(rules.parse("hello").unwrap_err(), RulesError::InvalidMoveFormat);
        assert_eq!(rules.parse("").unwrap_err(), RulesError::InvalidMoveFormat);
        assert_eq!(rules.parse("z9z9").unwrap_err(), RulesError::InvalidMoveFormat);
        assert!(rules.parse("e7e8q").is_ok());
    }

    #[test]
    fn test_parse_rejects_drops_and_null_move() {
        let rules = StandardRules::new();
        assert_eq!(rules.parse("P@e4").unwrap_err(), RulesError::InvalidMoveFormat);
        assert_eq!(rules.parse("0000").unwrap_err(), RulesError::InvalidMoveFormat);
    }

    #[test]
    fn test_illegal_move() {
        let rules = StandardRules::new();
        let mv = rules.parse("e2e5").unwrap();
        assert!(!rules.is_legal(STARTING_FEN, &mv).unwrap());
        assert_eq!(rules.apply(STARTING_FEN, &mv).unwrap_err(), RulesError::IllegalMove);
    }

    #[test]
    fn test_apply_san_and_fen() {
        let rules = StandardRules::new();
        let mv = rules.parse("g1f3").unwrap();
        let applied = rules.apply(STARTING_FEN, &mv).unwrap();
        assert_eq!(applied.uci, "g1f3");
        assert_eq!(applied.san, "Nf3");
        assert_eq!(
            applied.fen_after,
            "rnbqkbnr/pppppppp/8/8/8/5N2/PPPPPPPP/RNBQKB1R b KQkq - 1 1"
        );
    }

    #[test]
    fn test_fools_mate_is_checkmate() {
        let rules = StandardRules::new();
        let fens = play_line(&["f2f3", "e7e5", "g2g4"]);
        let mv = rules.parse("d8h4").unwrap();
        let applied = rules.apply(fens.last().unwrap(), &mv).unwrap();
        assert_eq!(applied.san, "Qh4#");

        let history: Vec<&str> = fens.iter().map(String::as_str).collect();
        let result = rules.termination(&applied.fen_after, &history).unwrap();
        assert_eq!(result, Some(Termination::Checkmate));
    }

    #[test]
    fn test_stalemate() {
        let rules = StandardRules::new();
        let fen = "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1";
        assert_eq!(rules.termination(fen, &[fen]).unwrap(), Some(Termination::Stalemate));
    }

    #[test]
    fn test_insufficient_material() {
        let rules = StandardRules::new();
        let fen = "8/8/4k3/8/8/3K4/8/8 w - - 0 1";
        assert_eq!(
            rules.termination(fen, &[fen]).unwrap(),
            Some(Termination::InsufficientMaterial)
        );
    }

    #[test]
    fn test_fifty_move_rule() {
        let rules = StandardRules::new();
        let fen = "4k3/8/8/8/8/8/4P3/R3K3 w - - 100 80";
        assert_eq!(rules.termination(fen, &[fen]).unwrap(), Some(Termination::FiftyMoves));
    }

    #[test]
    fn test_threefold_repetition() {
        let rules = StandardRules::new();
        // Knights out and back twice returns to the starting placement a third time.
        let fens = play_line(&[
            "g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8",
        ]);
        let history: Vec<&str> = fens.iter().map(String::as_str).collect();
        let last = fens.last().unwrap();
        assert_eq!(
            rules.termination(last, &history).unwrap(),
            Some(Termination::ThreefoldRepetition)
        );

        let short: Vec<&str> = history[..5].to_vec();
        assert_eq!(rules.termination(&fens[4], &short).unwrap(), None);
    }

    #[test]
    fn test_invalid_fen() {
        let rules = StandardRules::new();
        assert!(matches!(
            rules.side_to_move("not a fen"),
            Err(RulesError::InvalidPosition(_))
        ));
    }
}
