//! Configuration management for the client.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the MindSync server
    pub server_url: String,
    /// Directory holding one pending-changes file per project
    pub state_dir: PathBuf,
    /// Period of the auto-flush loop
    pub flush_interval: Duration,
    /// Timeout for a single HTTP request
    pub request_timeout: Duration,
    /// Ids per remote call
    pub batch_size: usize,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the server URL.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            state_dir: PathBuf::from(".mindsync"),
            flush_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            batch_size: mindsync_engine::DEFAULT_MAX_BATCH_SIZE,
        }
    }

    pub fn with_state_dir(mut self, state_dir: impl Into<PathBuf>) -> Self {
        self.state_dir = state_dir.into();
        self
    }

    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Load configuration from environment variables, reading `.env` first.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let server_url = lookup("MINDSYNC_SERVER_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingServerUrl)?;

        let mut config = Self::new(server_url.trim_end_matches('/'));

        if let Some(dir) = lookup("MINDSYNC_STATE_DIR") {
            config.state_dir = PathBuf::from(dir);
        }
        config.flush_interval = Duration::from_secs(parse_var(
            "MINDSYNC_FLUSH_INTERVAL_SECS",
            lookup("MINDSYNC_FLUSH_INTERVAL_SECS"),
            config.flush_interval.as_secs(),
        )?);
        config.request_timeout = Duration::from_secs(parse_var(
            "MINDSYNC_REQUEST_TIMEOUT_SECS",
            lookup("MINDSYNC_REQUEST_TIMEOUT_SECS"),
            config.request_timeout.as_secs(),
        )?);
        config.batch_size = parse_var(
            "MINDSYNC_BATCH_SIZE",
            lookup("MINDSYNC_BATCH_SIZE"),
            config.batch_size,
        )?;

        if config.flush_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "MINDSYNC_FLUSH_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }
        if config.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MINDSYNC_BATCH_SIZE",
                value: "0".to_string(),
            });
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("MINDSYNC_SERVER_URL environment variable is required")]
    MissingServerUrl,

    #[error("Invalid {name} value: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}
