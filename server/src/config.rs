//! Configuration management for the server.

use std::env;
use std::str::FromStr;

/// Default cap on records or ids per batch request.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// PostgreSQL connection URL
    pub database_url: String,
    /// Largest batch a single request may carry
    pub max_batch_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidPort)?;

        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?;

        let max_batch_size = parse_var(
            "MAX_BATCH_SIZE",
            env::var("MAX_BATCH_SIZE").ok(),
            DEFAULT_MAX_BATCH_SIZE,
        )?;
        if max_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "MAX_BATCH_SIZE",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            host,
            port,
            database_url,
            max_batch_size,
        })
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
    #[error("DATABASE_URL environment variable is required")]
    MissingDatabaseUrl,

    #[error("Invalid PORT value")]
    InvalidPort,

    #[error("Invalid {name} value: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}
