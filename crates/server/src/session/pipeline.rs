//! The move pipeline: validate one move against a session, commit it, detect the end
//! of the game. The next state is built on a copy, persisted, and only then swapped in.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Instant;

use chess_core::{Side, Termination};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::clock;
use super::error::SessionError;
use super::lifecycle::SessionManager;
use super::model::{GameResult, GameSession, GameStatus, Identity, MoveRecord};

/// An accepted move and the session state it produced.
#[derive(Debug, Clone, Serialize)]
pub struct MoveOutcome {
    pub record: MoveRecord,
    pub white_time: u32,
    pub black_time: u32,
    pub is_white_turn: bool,
    pub termination: Option<Termination>,
    pub result: Option<GameResult>,
    /// The engine seat is now to move in a game that is still going.
    pub engine_to_move: bool,
}

impl MoveOutcome {
    pub fn is_terminal(&self) -> bool {
        self.result.is_some()
    }

    pub fn reason(&self) -> Option<&'static str> {
        self.termination.map(Termination::reason)
    }
}

/// Marks an engine reply in flight for one game; released on drop.
struct EngineTurn<'a> {
    busy: &'a Mutex<HashSet<String>>,
    code: String,
}

impl<'a> EngineTurn<'a> {
    fn claim(busy: &'a Mutex<HashSet<String>>, code: &str) -> Option<Self> {
        let mut codes = busy.lock().unwrap_or_else(|e| e.into_inner());
        codes.insert(code.to_string()).then(|| EngineTurn {
            busy,
            code: code.to_string(),
        })
    }
}

impl Drop for EngineTurn<'_> {
    fn drop(&mut self) {
        let mut codes = self.busy.lock().unwrap_or_else(|e| e.into_inner());
        codes.remove(&self.code);
    }
}

impl SessionManager {
    /// Submit a move on behalf of a player. `elapsed_ms` is trusted.
    pub async fn submit_move(
        &self,
        code: &str,
        actor: &Identity,
        move_text: &str,
        elapsed_ms: u64,
    ) -> Result<MoveOutcome, SessionError> {
        let handle = self.handle(code).await?;
        let mut session = handle.lock().await;

        if session.status != GameStatus::Active {
            return Err(SessionError::InvalidState("Game is not active".into()));
        }
        let color = session
            .player_color(actor)
            .ok_or_else(|| SessionError::Forbidden("You are not a player in this game".into()))?;

        self.commit_move(&mut session, color, move_text, elapsed_ms).await
    }

    /// Whether `code` is an active game waiting on the engine. True after a failed
    /// engine reply too, until `play_engine_move` succeeds.
    pub async fn engine_to_move(&self, code: &str) -> Result<bool, SessionError> {
        let handle = self.handle(code).await?;
        let session = handle.lock().await;
        if session.status != GameStatus::Active {
            return Ok(false);
        }
        match session.engine_seat() {
            Some((side, _)) => Ok(self.rules.side_to_move(&session.current_fen)? == side),
            None => Ok(false),
        }
    }

    /// Ask the engine for its move and commit it. The session lock is released while
    /// the engine thinks; anything that changed in the meantime voids the reply.
    /// Safe to call again after a failure; one reply per game is in flight at a time.
    pub async fn play_engine_move(&self, code: &str) -> Result<MoveOutcome, SessionError> {
        let engine = self
            .engine
            .clone()
            .ok_or_else(|| SessionError::Unavailable("Engine is not available".into()))?;
        let _turn = EngineTurn::claim(&self.engine_busy, code)
            .ok_or_else(|| SessionError::Conflict("Engine is already thinking".into()))?;
        let handle = self.handle(code).await?;

        let (fen, side, difficulty) = {
            let session = handle.lock().await;
            if session.status != GameStatus::Active {
                return Err(SessionError::InvalidState("Game is not active".into()));
            }
            let (side, difficulty) = session
                .engine_seat()
                .ok_or_else(|| SessionError::InvalidState("Not a game against the computer".into()))?;
            if self.rules.side_to_move(&session.current_fen)? != side {
                return Err(SessionError::InvalidState("It's not the engine's turn".into()));
            }
            (session.current_fen.clone(), side, difficulty)
        };

        let started = Instant::now();
        let uci = engine.best_move(&fen, difficulty).await.map_err(|e| {
            warn!(code, error = %e, "engine failed to move");
            SessionError::Unavailable("Engine unavailable".into())
        })?;
        let think_ms = started.elapsed().as_millis() as u64;
        debug!(code, uci = %uci, think_ms, "engine replied");

        let mut session = handle.lock().await;
        if session.status != GameStatus::Active || session.current_fen != fen {
            info!(code, "engine reply discarded, game changed while thinking");
            return Err(SessionError::InvalidState(
                "Game changed while the engine was thinking".into(),
            ));
        }

        self.commit_move(&mut session, side, &uci, think_ms).await
    }

    /// Turn check, rules validation, clock update, terminal detection, persistence,
    /// publication. On any error `session` is left untouched.
    async fn commit_move(
        &self,
        session: &mut GameSession,
        color: Side,
        move_text: &str,
        elapsed_ms: u64,
    ) -> Result<MoveOutcome, SessionError> {
        if self.rules.side_to_move(&session.current_fen)? != color {
            return Err(SessionError::Forbidden("It's not your turn".into()));
        }

        let mv = self.rules.parse(move_text)?;
        let applied = self.rules.apply(&session.current_fen, &mv)?;
        let now = Utc::now();

        let mut next = session.clone();
        let remaining = clock::apply_elapsed(
            next.remaining(color),
            elapsed_ms,
            next.time_control.increment_secs(),
        );
        next.set_remaining(color, remaining);

        let record = MoveRecord {
            game_code: next.code.clone(),
            move_number: next.moves.len() as u32 + 1,
            move_uci: applied.uci,
            move_san: applied.san,
            fen_after: applied.fen_after,
            time_spent: elapsed_ms,
            created_at: now,
        };
        next.current_fen = record.fen_after.clone();
        next.moves.push(record.clone());
        next.last_move_at = Some(now);

        let termination = {
            let history = next.history();
            self.rules.termination(&next.current_fen, &history)?
        };
        if let Some(termination) = termination {
            let result = if termination.is_decisive() {
                GameResult::win_for(color)
            } else {
                GameResult::Draw
            };
            next.finish(GameStatus::Completed, result, termination.reason(), now);
        }

        self.store.record_move(&next, &record).await?;
        *session = next;

        debug!(
            code = %session.code,
            move_number = record.move_number,
            uci = %record.move_uci,
            san = %record.move_san,
            "move accepted"
        );
        if let Some(termination) = termination {
            info!(code = %session.code, reason = termination.reason(), "game over");
            self.emit_finished(session);
        }

        let engine_to_move = session.status == GameStatus::Active
            && session
                .engine_seat()
                .is_some_and(|(side, _)| side == color.opposite());

        let outcome = MoveOutcome {
            white_time: session.white_time_remaining,
            black_time: session.black_time_remaining,
            is_white_turn: session.is_white_turn(),
            termination,
            result: session.result,
            engine_to_move,
            record,
        };
        self.publish_move(&outcome).await;
        if outcome.is_terminal() {
            self.evict(&session.code).await;
        }
        Ok(outcome)
    }
}
