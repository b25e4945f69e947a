use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run the full Postgres schema migration inline.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Live game sessions (one row per game code)
CREATE TABLE IF NOT EXISTS game_sessions (
    code                 TEXT PRIMARY KEY,
    status               TEXT NOT NULL DEFAULT 'waiting',
    result               TEXT,
    end_reason           TEXT,
    time_control         TEXT NOT NULL,
    creator_color        TEXT NOT NULL,
    white_kind           TEXT NOT NULL DEFAULT 'empty',
    white_user_id        BIGINT,
    white_name           TEXT,
    white_guest_token    TEXT,
    white_difficulty     TEXT,
    black_kind           TEXT NOT NULL DEFAULT 'empty',
    black_user_id        BIGINT,
    black_name           TEXT,
    black_guest_token    TEXT,
    black_difficulty     TEXT,
    white_time_remaining INTEGER NOT NULL,
    black_time_remaining INTEGER NOT NULL,
    current_fen          TEXT NOT NULL,
    created_at           TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    started_at           TIMESTAMPTZ,
    ended_at             TIMESTAMPTZ,
    last_move_at         TIMESTAMPTZ
);

CREATE INDEX IF NOT EXISTS idx_game_sessions_status
    ON game_sessions (status);
CREATE INDEX IF NOT EXISTS idx_game_sessions_white_user
    ON game_sessions (white_user_id);
CREATE INDEX IF NOT EXISTS idx_game_sessions_black_user
    ON game_sessions (black_user_id);
CREATE INDEX IF NOT EXISTS idx_game_sessions_created_at
    ON game_sessions (created_at DESC);

-- Append-only move log
CREATE TABLE IF NOT EXISTS game_moves (
    id          BIGSERIAL PRIMARY KEY,
    game_code   TEXT NOT NULL REFERENCES game_sessions(code) ON DELETE CASCADE,
    move_number INTEGER NOT NULL,
    move_uci    TEXT NOT NULL,
    move_san    TEXT NOT NULL,
    fen_after   TEXT NOT NULL,
    time_spent  BIGINT NOT NULL DEFAULT 0,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE(game_code, move_number)
);

CREATE INDEX IF NOT EXISTS idx_game_moves_game_code
    ON game_moves (game_code, move_number);
"#;
