//! Error types for the MindSync engine.

use crate::ProjectId;
use thiserror::Error;

/// Errors returned by the engine.
///
/// Remote failures are not errors at this level: a flush reports them as
/// failed ids and keeps them pending. Only misuse and bad persisted state
/// end up here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // State errors
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("project mismatch: expected '{expected}', got '{actual}'")]
    ProjectMismatch {
        expected: ProjectId,
        actual: ProjectId,
    },

    // Misuse
    #[error("flush called without a remote client configured")]
    RemoteNotConfigured,

    #[error("flush called without a project id")]
    MissingProjectId,
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a single remote call.
///
/// The scheduler treats every variant the same way (the whole batch counts
/// as failed and stays pending), but the variants stay distinct so callers
/// layering a give-up policy on top can tell them apart in logs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("could not decode remote response: {0}")]
    Decode(String),

    #[error("graph provider error: {0}")]
    Provider(String),
}
