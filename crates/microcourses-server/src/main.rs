//! # microcourses-server
//!
//! HTTP backend for the MicroCourses learning-management system.
//!
//! This binary provides:
//! - **REST API** (axum) for auth, course authoring, enrollment, progress
//!   tracking, and certificate issuance
//! - **Idempotency-key gate** making every POST safe under client retries
//! - **Role-based authorization** for learners, creators, and admins
//! - **SQLite persistence** whose uniqueness constraints backstop the
//!   workflow against concurrent duplicate writes
//! - **Per-IP rate limiting** to protect against abuse

mod api;
mod auth;
mod certificate;
mod config;
mod courses;
mod enrollment;
mod error;
mod idempotency;
mod rate_limit;
mod seed;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use microcourses_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::idempotency::IdempotencyCache;
use crate::rate_limit::RateLimiter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,microcourses_server=debug")),
        )
        .init();

    info!(
        "Starting MicroCourses server v{}",
        env!("CARGO_PKG_VERSION")
    );

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(
        addr = %config.http_addr,
        database = %config.database_path.display(),
        seed_demo = config.seed_demo,
        rate_limit = config.rate_limit_max,
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Open the database
    // -----------------------------------------------------------------------
    let db = Arc::new(Mutex::new(Database::open_at(&config.database_path)?));

    // -----------------------------------------------------------------------
    // 4. Bootstrap (failures are logged, never fatal)
    // -----------------------------------------------------------------------
    {
        let db = db.lock().await;
        seed::initialize_admin(&db, &config);
        if config.seed_demo {
            seed::seed_demo_data(&db, &config);
        }
    }

    // -----------------------------------------------------------------------
    // 5. Build shared state
    // -----------------------------------------------------------------------
    let idempotency = IdempotencyCache::new(config.idempotency_retention);
    let rate_limiter = RateLimiter::new(config.rate_limit_max, config.rate_limit_window);

    let app_state = AppState {
        db: db.clone(),
        idempotency: idempotency.clone(),
        rate_limiter: rate_limiter.clone(),
        config: Arc::new(config.clone()),
    };

    // -----------------------------------------------------------------------
    // 6. Spawn background maintenance tasks
    // -----------------------------------------------------------------------

    // Hourly sweep of expired idempotency entries.
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            idempotency.purge_expired().await;
        }
    });

    // Rate-limit window cleanup (every 5 minutes).
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            rate_limiter.purge_stale().await;
        }
    });

    // Hourly sweep of expired sessions.
    let session_db = db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            let db = session_db.lock().await;
            match db.purge_expired_sessions() {
                Ok(removed) if removed > 0 => debug!(removed, "purged expired sessions"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "session purge failed"),
            }
        }
    });

    // -----------------------------------------------------------------------
    // 7. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
