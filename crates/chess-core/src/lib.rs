//! Chess rules collaborator for the game server: move parsing, legality, notation,
//! terminal detection and PGN export, all backed by `shakmaty`.

pub mod game_data;
pub mod pgn;
pub mod rules;

pub use rules::{AppliedMove, Rules, RulesError, Side, StandardRules, Termination, STARTING_FEN};
pub use shakmaty::uci::UciMove;
