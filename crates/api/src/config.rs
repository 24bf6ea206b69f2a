use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `90`). Must exceed every
    /// upstream client timeout.
    pub request_timeout_secs: u64,
    /// Upper bound on post-shutdown cleanup, in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Directory uploaded templates are written under (default: `storage`).
    pub storage_root: PathBuf,
    /// Editor sessions idle longer than this are closed (default: `60`).
    pub editor_idle_mins: i64,
    /// JWT token configuration (secret, expiry durations).
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                    |
    /// |----------------------------|----------------------------|
    /// | `HOST`                     | `0.0.0.0`                  |
    /// | `PORT`                     | `3000`                     |
    /// | `CORS_ORIGINS`             | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`     | `90`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                       |
    /// | `STORAGE_ROOT`             | `storage`                  |
    /// | `EDITOR_SESSION_IDLE_MINS` | `60`                       |
    pub fn from_env() -> Self {
        let cors_origins = env_or("CORS_ORIGINS", "http://localhost:5173".to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        let editor_idle_mins: i64 = env_or("EDITOR_SESSION_IDLE_MINS", 60);
        assert!(editor_idle_mins > 0, "EDITOR_SESSION_IDLE_MINS must be positive");

        Self {
            host: env_or("HOST", "0.0.0.0".to_string()),
            port: env_or("PORT", 3000),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 90),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            storage_root: env_or("STORAGE_ROOT", PathBuf::from("storage")),
            editor_idle_mins,
            jwt: JwtConfig::from_env(),
        }
    }
}

/// Room left after a chat turn's model call for applying patches and
/// writing the response.
const CHAT_TURN_MARGIN: Duration = Duration::from_secs(5);

impl ServerConfig {
    /// Fail unless an upstream call limited to `upstream_secs` (configured
    /// through `var`) ends before the request timeout cuts its handler off.
    pub fn check_upstream_timeout(&self, var: &str, upstream_secs: u64) -> Result<(), String> {
        if upstream_secs < self.request_timeout_secs {
            Ok(())
        } else {
            Err(format!(
                "{var} ({upstream_secs}s) must be below REQUEST_TIMEOUT_SECS ({}s)",
                self.request_timeout_secs
            ))
        }
    }

    /// Time a chat turn may wait for the model. Always ends before the
    /// request timeout.
    pub fn chat_turn_limit(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
            .saturating_sub(CHAT_TURN_MARGIN)
            .max(Duration::from_secs(1))
    }
}

/// Read and parse `key`, falling back to `default` when it is unset.
///
/// # Panics
///
/// Panics when the variable is set but does not parse as `T`.
pub(crate) fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}
