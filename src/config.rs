//! Tracker and server configuration. The server reads `PORTAL_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default quiet period before a step change is persisted.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Default timeout for a single fetch/update call to the progress store.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Onboarding step tracker configuration.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Quiet period after the last `update_step` before persisting.
    pub debounce: Duration,
    /// Upper bound on each restore / persistence call.
    pub request_timeout: Duration,
    /// When false, step changes stay in memory and are never persisted.
    pub auto_save: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            auto_save: true,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/portal.db"),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// `PORTAL_DB_PATH`, `PORTAL_PORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            db_path: lookup("PORTAL_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            port: parse_var(&lookup, "PORTAL_PORT")?.unwrap_or(defaults.port),
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
    }
}
