//! Error types for the rowsink core library.
//!
//! Uses hierarchical domain-specific errors following the thiserror pattern.

use thiserror::Error;

/// Result type alias for rowsink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for rowsink.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Buffer-related error
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Backend-related error
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Buffer-specific errors.
#[derive(Error, Debug)]
pub enum BufferError {
    /// A submitted row lacks one of the configured dedup key attributes.
    /// This is caller misuse and fails the operation rather than silently
    /// degrading deduplication.
    #[error("Request is missing dedup key attribute '{attribute}'")]
    MissingKeyAttribute { attribute: String },
}

/// Backend-specific errors.
///
/// The write buffer treats every variant uniformly: a failed bulk write
/// means the delivery status of the batch in flight is unknown.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend rejected the bulk write outright
    #[error("Bulk write rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The backend is throttling writes
    #[error("Bulk write throttled: {message}")]
    Throttled { message: String },

    /// Failed to reach the backend
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The circuit breaker is open and the call was not attempted
    #[error("Circuit breaker is open - bulk writes temporarily blocked")]
    CircuitOpen,

    /// The backend answered with a body this client cannot interpret
    #[error("Invalid bulk-write response: {0}")]
    InvalidResponse(String),
}

// Conversion implementations for external error types

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
