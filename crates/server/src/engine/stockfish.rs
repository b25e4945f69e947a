//! Stockfish over UCI (async I/O). One process is shared and restarted after any
//! I/O failure.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{BotDifficulty, EngineError, MoveEngine};

/// Stockfish ignores `UCI_Elo` below this.
const MIN_LIMITED_ELO: u32 = 1320;

/// Extra time allowed on top of the configured move time.
const MOVE_GRACE: Duration = Duration::from_secs(5);

/// Stockfish engine instance
pub struct StockfishEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StockfishEngine {
    /// Spawn a new Stockfish process and initialize UCI
    pub async fn new(path: &str) -> Result<Self, EngineError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Process(format!("Failed to spawn Stockfish: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Process("Stockfish stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| EngineError::Process("Stockfish stdout unavailable".into()))?;

        let mut engine = Self {
            process,
            stdin,
            stdout,
        };

        engine.send("uci").await?;
        engine.wait_for("uciok").await?;
        engine.send("setoption name Threads value 1").await?;
        engine.send("setoption name Hash value 64").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;

        Ok(engine)
    }

    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "SF <");
        self.stdin
            .write_all(format!("{cmd}\n").as_bytes())
            .await
            .map_err(|e| EngineError::Process(format!("Failed to write to Stockfish: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| EngineError::Process(format!("Failed to flush stdin: {e}")))?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        let read = self
            .stdout
            .read_line(&mut line)
            .await
            .map_err(|e| EngineError::Process(format!("Failed to read from Stockfish: {e}")))?;
        if read == 0 {
            return Err(EngineError::Process("Stockfish closed its output".into()));
        }
        let trimmed = line.trim().to_string();
        debug!(line = %trimmed, "SF >");
        Ok(trimmed)
    }

    async fn wait_for(&mut self, expected: &str) -> Result<(), EngineError> {
        loop {
            if self.read_line().await? == expected {
                return Ok(());
            }
        }
    }

    /// Configure strength for `difficulty`, then search `fen` for a move.
    pub async fn best_move(&mut self, fen: &str, difficulty: BotDifficulty) -> Result<String, EngineError> {
        let settings = difficulty.settings();

        self.send(&format!("setoption name Skill Level value {}", settings.skill_level))
            .await?;
        if settings.elo >= MIN_LIMITED_ELO {
            self.send("setoption name UCI_LimitStrength value true").await?;
            self.send(&format!("setoption name UCI_Elo value {}", settings.elo))
                .await?;
        } else {
            self.send("setoption name UCI_LimitStrength value false").await?;
        }
        self.send("isready").await?;
        self.wait_for("readyok").await?;

        let movetime_ms = (settings.move_time * 1000.0) as u64;
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!("go depth {} movetime {movetime_ms}", settings.depth))
            .await?;

        loop {
            let line = self.read_line().await?;
            if line.starts_with("bestmove") {
                return parse_bestmove(&line);
            }
        }
    }

    /// Send quit command and wait for process to exit
    pub async fn quit(&mut self) {
        let _ = self.send("quit").await;
        let _ = self.process.wait().await;
    }
}

impl Drop for StockfishEngine {
    fn drop(&mut self) {
        let _ = self.process.start_kill();
    }
}

fn parse_bestmove(line: &str) -> Result<String, EngineError> {
    match line.split_whitespace().nth(1) {
        Some("(none)") | None => Err(EngineError::NoMove),
        Some(mv) => Ok(mv.to_string()),
    }
}

/// Shared engine handle. The process is spawned on first use.
pub struct StockfishService {
    path: String,
    engine: Mutex<Option<StockfishEngine>>,
}

impl StockfishService {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            engine: Mutex::new(None),
        }
    }

    pub async fn shutdown(&self) {
        if let Some(mut engine) = self.engine.lock().await.take() {
            engine.quit().await;
        }
    }
}

#[async_trait]
impl MoveEngine for StockfishService {
    async fn best_move(&self, fen: &str, difficulty: BotDifficulty) -> Result<String, EngineError> {
        let mut guard = self.engine.lock().await;
        if guard.is_none() {
            *guard = Some(StockfishEngine::new(&self.path).await?);
        }
        let Some(engine) = guard.as_mut() else {
            return Err(EngineError::Process("Stockfish not running".into()));
        };

        let budget = Duration::from_secs_f64(difficulty.settings().move_time) + MOVE_GRACE;
        let outcome = match tokio::time::timeout(budget, engine.best_move(fen, difficulty)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout),
        };

        // The process state is unknown after a failure; start fresh next time.
        if matches!(outcome, Err(EngineError::Process(_)) | Err(EngineError::Timeout)) {
            warn!(error = ?outcome.as_ref().err(), "restarting Stockfish");
            *guard = None;
        }
        outcome
    }
}
