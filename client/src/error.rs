//! Error types for the MindSync client.

use crate::config::ConfigError;
use mindsync_engine::RemoteError;
use thiserror::Error;

/// Errors returned by client operations.
///
/// Failed syncs are not errors: a flush reports them and keeps the ids
/// pending. This covers setup problems, local persistence and the remote
/// calls the client makes outside a flush (loading a project).
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Engine(#[from] mindsync_engine::Error),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
