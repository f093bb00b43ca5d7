//! Common error types for the jukebox

use serde::Serialize;
use thiserror::Error;

/// Common result type for jukebox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Infrastructure errors (files, serialization, configuration)
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Machine-readable error category reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Conflict,
    NotFound,
    UpstreamUnavailable,
    PersistenceFailure,
}

/// Domain errors raised by jukebox operations
///
/// Every variant maps to one [`ErrorKind`]. None of them is fatal to the server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JukeboxError {
    /// Missing or malformed request field
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The user already proposed or voted
    #[error("User {0} has already proposed or voted")]
    AlreadyActed(String),

    /// The file is already in the queue
    #[error("Already queued: {0}")]
    DuplicateQueueEntry(String),

    /// The file is not part of the library
    #[error("Unknown library item: {0}")]
    UnknownItem(String),

    /// The file is not in the queue
    #[error("Not queued: {0}")]
    NotFound(String),

    /// External player unreachable or errored
    #[error("Player unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Snapshot could not be written
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl JukeboxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JukeboxError::InvalidInput(_) => ErrorKind::InvalidInput,
            JukeboxError::AlreadyActed(_) | JukeboxError::DuplicateQueueEntry(_) => {
                ErrorKind::Conflict
            }
            JukeboxError::UnknownItem(_) | JukeboxError::NotFound(_) => ErrorKind::NotFound,
            JukeboxError::UpstreamUnavailable(_) => ErrorKind::UpstreamUnavailable,
            JukeboxError::PersistenceFailure(_) => ErrorKind::PersistenceFailure,
        }
    }

    /// Stable error code, finer grained than [`ErrorKind`]
    pub fn code(&self) -> &'static str {
        match self {
            JukeboxError::InvalidInput(_) => "INVALID_INPUT",
            JukeboxError::AlreadyActed(_) => "ALREADY_ACTED",
            JukeboxError::DuplicateQueueEntry(_) => "DUPLICATE_QUEUE_ENTRY",
            JukeboxError::UnknownItem(_) => "UNKNOWN_ITEM",
            JukeboxError::NotFound(_) => "NOT_FOUND",
            JukeboxError::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            JukeboxError::PersistenceFailure(_) => "PERSISTENCE_FAILURE",
        }
    }
}
