use std::sync::Arc;

use anyhow::Context;
use chess_core::StandardRules;
use game_server::config::Config;
use game_server::db::{self, MemoryStore, PgSessionStore, SessionStore};
use game_server::engine::StockfishService;
use game_server::rooms::RoomRegistry;
use game_server::routes;
use game_server::session::{LogSink, SessionManager};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    let store: Arc<dyn SessionStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::pool::create_pool(url)
                .await
                .context("Failed to connect to database")?;

            tracing::info!("Running migrations...");
            db::pool::run_migrations(&pool)
                .await
                .context("Failed to run migrations")?;
            Arc::new(PgSessionStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set - games are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let engine = Arc::new(StockfishService::new(config.stockfish_path.clone()));
    let rooms = Arc::new(RoomRegistry::new(config.outbound_buffer));
    let sessions = Arc::new(
        SessionManager::new(store, Arc::new(StandardRules::new()))
            .with_engine(engine.clone())
            .with_sink(Arc::new(LogSink))
            .with_publisher(rooms.clone()),
    );

    let app = routes::router(sessions, rooms.clone(), config.clone());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
            // Close every socket so upgraded connections drain.
            rooms.shutdown().await;
        })
        .await
        .context("Server error")?;

    engine.shutdown().await;
    Ok(())
}
