//! Error types for album-dl
//!
//! This module provides the error handling for the library:
//! - Domain-specific error types (Database, Remote, Archive)
//! - Machine-readable error codes for collaborators that surface task failures
//! - Context information (config key, HTTP status, archive path)

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for album-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for album-dl
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.chunk_size")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Remote photo server error
    #[error("remote server error: {0}")]
    Remote(#[from] RemoteError),

    /// Archive read/write error
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Image decode/encode error
    #[error("image error: {0}")]
    Image(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found (task, profile, downloaded album)
    #[error("not found: {0}")]
    NotFound(String),

    /// Shutdown in progress - not accepting new tasks
    #[error("shutdown in progress: not accepting new tasks")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Errors reported by the remote photo server client
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No remote URL / API key configured
    #[error("remote server not configured")]
    NotConfigured,

    /// The server rejected the API key
    #[error("the provided API key is invalid")]
    Unauthorized,

    /// The server answered with a non-success status
    #[error("{context}: HTTP error {status}")]
    HttpStatus {
        /// HTTP status code returned by the server
        status: u16,
        /// What was being requested (e.g., "fetching album")
        context: String,
    },

    /// The server answered, but not in the expected shape
    #[error("unexpected response from server: {0}")]
    UnexpectedResponse(String),

    /// The server could not be reached at all
    #[error("could not reach the server: {0}")]
    Unreachable(String),
}

/// Archive container errors
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Failed to create or finish an output archive
    #[error("failed to write archive {path}: {reason}")]
    WriteFailed {
        /// The archive being written
        path: PathBuf,
        /// The reason the write failed
        reason: String,
    },

    /// Failed to open or read a source archive
    #[error("failed to read archive {path}: {reason}")]
    ReadFailed {
        /// The archive being read
        path: PathBuf,
        /// The reason the read failed
        reason: String,
    },

    /// Entry was appended after the archive was finished
    #[error("archive {path} is already finished")]
    AlreadyFinished {
        /// The finished archive
        path: PathBuf,
    },
}

/// Why an engine run did not complete
///
/// The executor stores the display text as the task's error message, so `Cancelled`
/// always reads "cancelled" and callers can tell "stopped" from "broke".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    /// The task's cancellation token fired
    #[error("cancelled")]
    Cancelled,

    /// Any other failure, with the message to record
    #[error("{0}")]
    Failed(String),
}

impl TaskFailure {
    /// Failure with `context` prepended to the error text
    pub fn with_context(context: &str, error: impl std::fmt::Display) -> Self {
        TaskFailure::Failed(format!("{}: {}", context, error))
    }
}

impl From<Error> for TaskFailure {
    fn from(error: Error) -> Self {
        TaskFailure::Failed(error.to_string())
    }
}

impl Error {
    /// Machine-readable error code
    ///
    /// Collaborators that expose task failures (HTTP handlers, UIs) can use this for
    /// programmatic handling instead of matching on the message text.
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) | Error::Sqlx(_) => "database_error",
            Error::Remote(e) => match e {
                RemoteError::NotConfigured => "remote_not_configured",
                RemoteError::Unauthorized => "remote_unauthorized",
                RemoteError::HttpStatus { .. } => "remote_http_error",
                RemoteError::UnexpectedResponse(_) => "remote_unexpected_response",
                RemoteError::Unreachable(_) => "remote_unreachable",
            },
            Error::Archive(e) => match e {
                ArchiveError::WriteFailed { .. } => "archive_write_failed",
                ArchiveError::ReadFailed { .. } => "archive_read_failed",
                ArchiveError::AlreadyFinished { .. } => "archive_finished",
            },
            Error::Image(_) => "image_error",
            Error::Io(_) => "io_error",
            Error::NotFound(_) => "not_found",
            Error::ShuttingDown => "shutting_down",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }
}
