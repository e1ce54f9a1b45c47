//! Common error types for Fairplay

use thiserror::Error;

/// Common result type for Fairplay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type shared by the sorter engine and its service clients
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure talking to the streaming service
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success response from the streaming service
    #[error("Service error {status}: {message}")]
    Api {
        /// HTTP status code returned by the service
        status: u16,
        /// Response body, when one was readable
        message: String,
    },

    /// A response arrived but lacked a field the engine cannot work without
    /// (e.g. the playlist snapshot token)
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Caller or sequencing bug, e.g. an operation applied against data that
    /// was never fetched
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The surrounding run was cancelled. Never reported to subscribers as a
    /// failure; the controller converts it into a quiet "stopped" status.
    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// True when this error is the cancellation sentinel rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}
