//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// Filesystem path of the SQLite database.
    /// Env: `DATABASE_PATH`
    /// Default: `./microcourses.db`
    pub database_path: PathBuf,

    /// Comma-separated list of allowed CORS origins.
    /// Env: `FRONTEND_URLS`
    /// Default: empty (any origin allowed).
    pub allowed_origins: Vec<String>,

    /// Email of the bootstrap admin account.
    /// Env: `ADMIN_EMAIL`
    /// Default: `admin@mail.com` (development only).
    pub admin_email: String,

    /// Password of the bootstrap admin account.
    /// Env: `ADMIN_PASSWORD`
    /// Default: `admin123` (development only).
    pub admin_password: String,

    /// Whether to seed a demo course on startup when no courses exist.
    /// Env: `SEED_DEMO` (true/false)
    /// Default: `false`
    pub seed_demo: bool,

    /// How long a recorded idempotency key replays its response.
    /// Env: `IDEMPOTENCY_RETENTION_SECS`
    /// Default: 86400 (24 hours).
    pub idempotency_retention: Duration,

    /// Maximum requests per IP per rate-limit window.
    /// Env: `RATE_LIMIT_MAX`
    /// Default: `60`
    pub rate_limit_max: u32,

    /// Length of the rate-limit window.
    /// Env: `RATE_LIMIT_WINDOW_SECS`
    /// Default: 60 seconds.
    pub rate_limit_window: Duration,

    /// Bearer session lifetime in days.
    /// Env: `SESSION_TTL_DAYS`
    /// Default: `30`
    pub session_ttl_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 5000).into(),
            database_path: PathBuf::from("./microcourses.db"),
            allowed_origins: Vec::new(),
            admin_email: "admin@mail.com".to_string(),
            admin_password: "admin123".to_string(),
            seed_demo: false,
            idempotency_retention: Duration::from_secs(24 * 60 * 60),
            rate_limit_max: 60,
            rate_limit_window: Duration::from_secs(60),
            session_ttl_days: 30,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Ok(origins) = std::env::var("FRONTEND_URLS") {
            config.allowed_origins = origins
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }

        if let Ok(email) = std::env::var("ADMIN_EMAIL") {
            config.admin_email = email;
        }

        if let Ok(password) = std::env::var("ADMIN_PASSWORD") {
            config.admin_password = password;
        }

        if let Ok(val) = std::env::var("SEED_DEMO") {
            config.seed_demo = val == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("IDEMPOTENCY_RETENTION_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => config.idempotency_retention = Duration::from_secs(secs),
                Err(_) => {
                    tracing::warn!(value = %val, "Invalid IDEMPOTENCY_RETENTION_SECS, using default")
                }
            }
        }

        if let Ok(val) = std::env::var("RATE_LIMIT_MAX") {
            if let Ok(n) = val.parse::<u32>() {
                config.rate_limit_max = n;
            }
        }

        if let Ok(val) = std::env::var("RATE_LIMIT_WINDOW_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.rate_limit_window = Duration::from_secs(secs);
            }
        }

        if let Ok(val) = std::env::var("SESSION_TTL_DAYS") {
            if let Ok(days) = val.parse::<i64>() {
                config.session_ttl_days = days;
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 5000).into());
        assert_eq!(config.idempotency_retention, Duration::from_secs(86400));
        assert_eq!(config.rate_limit_max, 60);
        assert!(config.allowed_origins.is_empty());
    }
}
