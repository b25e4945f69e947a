use std::collections::HashMap;

use async_trait::async_trait;
use chess_core::Side;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{SessionStore, StoreError};
use crate::engine::BotDifficulty;
use crate::session::model::{
    GameResult, GameSession, GameStatus, MoveRecord, Occupant, TimeControl, UserRef,
};

/// Postgres-backed session store.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    code: String,
    status: String,
    result: Option<String>,
    end_reason: Option<String>,
    time_control: String,
    creator_color: String,
    white_kind: String,
    white_user_id: Option<i64>,
    white_name: Option<String>,
    white_guest_token: Option<String>,
    white_difficulty: Option<String>,
    black_kind: String,
    black_user_id: Option<i64>,
    black_name: Option<String>,
    black_guest_token: Option<String>,
    black_difficulty: Option<String>,
    white_time_remaining: i32,
    black_time_remaining: i32,
    current_fen: String,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    last_move_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct MoveRow {
    game_code: String,
    move_number: i32,
    move_uci: String,
    move_san: String,
    fen_after: String,
    time_spent: i64,
    created_at: DateTime<Utc>,
}

/// Flattened seat columns: (kind, user_id, name, guest_token, difficulty).
type SeatColumns<'a> = (&'static str, Option<i64>, Option<&'a str>, Option<&'a str>, Option<&'static str>);

fn seat_columns(occupant: &Occupant) -> SeatColumns<'_> {
    match occupant {
        Occupant::Empty => ("empty", None, None, None, None),
        Occupant::Registered(user) => ("registered", Some(user.id), Some(user.username.as_str()), None, None),
        Occupant::Guest { name, token } => ("guest", None, Some(name.as_str()), Some(token.as_str()), None),
        Occupant::Engine(difficulty) => ("engine", None, None, None, Some(difficulty.as_str())),
    }
}

fn occupant_from_columns(
    kind: &str,
    user_id: Option<i64>,
    name: Option<String>,
    guest_token: Option<String>,
    difficulty: Option<String>,
) -> Result<Occupant, StoreError> {
    let corrupt = |what: &str| StoreError::Corrupt(format!("{kind} seat missing {what}"));
    match kind {
        "empty" => Ok(Occupant::Empty),
        "registered" => Ok(Occupant::Registered(UserRef {
            id: user_id.ok_or_else(|| corrupt("user_id"))?,
            username: name.unwrap_or_default(),
        })),
        "guest" => Ok(Occupant::Guest {
            name: name.ok_or_else(|| corrupt("name"))?,
            token: guest_token.ok_or_else(|| corrupt("guest_token"))?,
        }),
        "engine" => {
            let raw = difficulty.ok_or_else(|| corrupt("difficulty"))?;
            BotDifficulty::parse(&raw)
                .map(Occupant::Engine)
                .ok_or_else(|| StoreError::Corrupt(format!("unknown difficulty {raw}")))
        }
        other => Err(StoreError::Corrupt(format!("unknown seat kind {other}"))),
    }
}

fn clock_secs(value: i32) -> u32 {
    value.max(0) as u32
}

impl TryFrom<SessionRow> for GameSession {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let status = GameStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown status {}", row.status)))?;
        let result = match row.result.as_deref() {
            Some(raw) => Some(
                GameResult::parse(raw)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown result {raw}")))?,
            ),
            None => None,
        };
        let time_control = TimeControl::parse(&row.time_control)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown time control {}", row.time_control)))?;
        let creator_color = Side::parse(&row.creator_color)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown color {}", row.creator_color)))?;

        Ok(GameSession {
            white: occupant_from_columns(
                &row.white_kind,
                row.white_user_id,
                row.white_name,
                row.white_guest_token,
                row.white_difficulty,
            )?,
            black: occupant_from_columns(
                &row.black_kind,
                row.black_user_id,
                row.black_name,
                row.black_guest_token,
                row.black_difficulty,
            )?,
            code: row.code,
            status,
            result,
            end_reason: row.end_reason,
            creator_color,
            time_control,
            white_time_remaining: clock_secs(row.white_time_remaining),
            black_time_remaining: clock_secs(row.black_time_remaining),
            current_fen: row.current_fen,
            moves: Vec::new(),
            created_at: row.created_at,
            started_at: row.started_at,
            ended_at: row.ended_at,
            last_move_at: row.last_move_at,
        })
    }
}

impl From<MoveRow> for MoveRecord {
    fn from(row: MoveRow) -> Self {
        MoveRecord {
            game_code: row.game_code,
            move_number: row.move_number.max(0) as u32,
            move_uci: row.move_uci,
            move_san: row.move_san,
            fen_after: row.fen_after,
            time_spent: row.time_spent.max(0) as u64,
            created_at: row.created_at,
        }
    }
}

fn map_unique_violation(err: sqlx::Error, what: String) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(what),
        _ => StoreError::Sqlx(err),
    }
}

const UPDATE_SESSION_SQL: &str = r#"UPDATE game_sessions SET
    status = $2, result = $3, end_reason = $4,
    white_kind = $5, white_user_id = $6, white_name = $7, white_guest_token = $8, white_difficulty = $9,
    black_kind = $10, black_user_id = $11, black_name = $12, black_guest_token = $13, black_difficulty = $14,
    white_time_remaining = $15, black_time_remaining = $16, current_fen = $17,
    started_at = $18, ended_at = $19, last_move_at = $20
WHERE code = $1"#;

fn update_query(session: &GameSession) -> sqlx::query::Query<'_, sqlx::Postgres, sqlx::postgres::PgArguments> {
    let (wk, wid, wname, wtok, wdiff) = seat_columns(&session.white);
    let (bk, bid, bname, btok, bdiff) = seat_columns(&session.black);
    sqlx::query(UPDATE_SESSION_SQL)
        .bind(&session.code)
        .bind(session.status.as_str())
        .bind(session.result.map(|r| r.as_str()))
        .bind(session.end_reason.as_deref())
        .bind(wk)
        .bind(wid)
        .bind(wname)
        .bind(wtok)
        .bind(wdiff)
        .bind(bk)
        .bind(bid)
        .bind(bname)
        .bind(btok)
        .bind(bdiff)
        .bind(session.white_time_remaining as i32)
        .bind(session.black_time_remaining as i32)
        .bind(&session.current_fen)
        .bind(session.started_at)
        .bind(session.ended_at)
        .bind(session.last_move_at)
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load_session(&self, code: &str) -> Result<Option<GameSession>, StoreError> {
        let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM game_sessions WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut session = GameSession::try_from(row)?;

        let moves = sqlx::query_as::<_, MoveRow>(
            r#"SELECT game_code, move_number, move_uci, move_san, fen_after, time_spent, created_at
            FROM game_moves WHERE game_code = $1 ORDER BY move_number"#,
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?;
        session.moves = moves.into_iter().map(MoveRecord::from).collect();

        Ok(Some(session))
    }

    async fn session_exists(&self, code: &str) -> Result<bool, StoreError> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM game_sessions WHERE code = $1)")
            .bind(code)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn insert_session(&self, session: &GameSession) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO game_sessions (
                code, status, time_control, creator_color,
                white_time_remaining, black_time_remaining, current_fen, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(&session.code)
        .bind(session.status.as_str())
        .bind(session.time_control.as_str())
        .bind(session.creator_color.as_str())
        .bind(session.white_time_remaining as i32)
        .bind(session.black_time_remaining as i32)
        .bind(&session.current_fen)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, session.code.clone()))?;

        // Seats and everything else go through the one UPDATE statement.
        update_query(session).execute(&self.pool).await?;
        Ok(())
    }

    async fn save_session(&self, session: &GameSession) -> Result<(), StoreError> {
        update_query(session).execute(&self.pool).await?;
        Ok(())
    }

    async fn record_move(&self, session: &GameSession, record: &MoveRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO game_moves (game_code, move_number, move_uci, move_san, fen_after, time_spent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(&record.game_code)
        .bind(record.move_number as i32)
        .bind(&record.move_uci)
        .bind(&record.move_san)
        .bind(&record.fen_after)
        .bind(record.time_spent.min(i64::MAX as u64) as i64)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, format!("{} move {}", record.game_code, record.move_number)))?;

        update_query(session).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_for_user(&self, user_id: i64, limit: usize) -> Result<Vec<GameSession>, StoreError> {
        let rows = sqlx::query_as::<_, SessionRow>(
            r#"SELECT * FROM game_sessions
            WHERE white_user_id = $1 OR black_user_id = $1
            ORDER BY created_at DESC
            LIMIT $2"#,
        )
        .bind(user_id)
        .bind(limit.min(i64::MAX as usize) as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut games = rows
            .into_iter()
            .map(GameSession::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        if games.is_empty() {
            return Ok(games);
        }

        let codes: Vec<String> = games.iter().map(|g| g.code.clone()).collect();
        let moves = sqlx::query_as::<_, MoveRow>(
            r#"SELECT game_code, move_number, move_uci, move_san, fen_after, time_spent, created_at
            FROM game_moves WHERE game_code = ANY($1) ORDER BY game_code, move_number"#,
        )
        .bind(&codes)
        .fetch_all(&self.pool)
        .await?;

        let mut by_code: HashMap<String, Vec<MoveRecord>> = HashMap::new();
        for row in moves {
            by_code.entry(row.game_code.clone()).or_default().push(row.into());
        }
        for game in &mut games {
            game.moves = by_code.remove(&game.code).unwrap_or_default();
        }
        Ok(games)
    }
}
