//! Error types for the synchronization engine

use thiserror::Error;

/// Main error type for setup and configuration paths
///
/// `poll()` never returns this type. Failures during synchronization are
/// captured as [`FetchError`] values and recorded on the affected stream.
#[derive(Error, Debug)]
pub enum Error {
    /// Store connection error (connect, create database)
    #[error("Store error: {0}")]
    Store(#[from] FetchError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Failure of a single fetch cycle
///
/// A fetch either fully succeeds or fully fails; this type carries the
/// failure side. It is cheap to clone so streams can keep the most recent
/// one around for diagnostics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The store was unreachable or rejected the query
    #[error("Connection error: {0}")]
    Connection(String),

    /// A returned row could not be interpreted as a measurement
    #[error("Parse error: {0}")]
    Parse(String),

    /// The background task ended without reporting a result
    #[error("Fetch task failed: {0}")]
    Task(String),
}

impl FetchError {
    /// Short label used for metrics and log fields
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Connection(_) => "connection",
            FetchError::Parse(_) => "parse",
            FetchError::Task(_) => "task",
        }
    }

    /// The message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            FetchError::Connection(msg) | FetchError::Parse(msg) | FetchError::Task(msg) => msg,
        }
    }
}

/// Result type for setup and configuration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result of one fetch cycle: every measurement newer than the cursor, or the failure
pub type FetchResult = std::result::Result<Vec<crate::types::Measurement>, FetchError>;
