//! Error types for doclimit.

use std::time::Duration;
use thiserror::Error;

/// Errors reported by the windowed rate limiter.
///
/// `Cancelled` and `Timeout` are recoverable: the limiter state is untouched
/// and the caller may try again. `Shutdown` is terminal for the instance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimiterError {
    /// The limiter was constructed with a zero limit or a zero window.
    #[error("Invalid limiter configuration: {0}")]
    InvalidConfig(String),

    /// The caller's cancellation signal fired while waiting for capacity.
    #[error("Acquire cancelled while waiting for capacity")]
    Cancelled,

    /// The deadline elapsed while waiting for capacity.
    #[error("Timed out after {0:?} waiting for capacity")]
    Timeout(Duration),

    /// The limiter has been shut down.
    #[error("Rate limiter has been shut down")]
    Shutdown,
}

impl LimiterError {
    /// Whether the caller may retry the same limiter after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LimiterError::Cancelled | LimiterError::Timeout(_))
    }
}

/// Main error type for doclimit operations.
#[derive(Error, Debug)]
pub enum DoclimitError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Rate limiting errors
    #[error("Rate limit error: {0}")]
    Limiter(#[from] LimiterError),

    /// Payload serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Errors reported by the document transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// A submission task panicked or was cancelled
    #[error("Submission task failed: {0}")]
    Task(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for DoclimitError {
    fn from(err: config::ConfigError) -> Self {
        DoclimitError::Config(err.to_string())
    }
}

/// Result type alias for doclimit operations.
pub type Result<T> = std::result::Result<T, DoclimitError>;
