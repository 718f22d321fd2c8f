//! Common error types for Vigil
//!
//! Consumer-visible session failures live here alongside configuration
//! errors. Port-specific errors are defined in their port modules and
//! re-exported for convenience.

use std::time::Duration;
use thiserror::Error;

use crate::ports::capture::SourceId;

pub use crate::logging::LoggerError;
pub use crate::ports::capture::BackendError;

/// Failure description delivered to the consumer error callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The capture target is invalid or inaccessible; never retried
    #[error("Capture source {target} unavailable: {reason}")]
    SourceUnavailable { target: SourceId, reason: String },

    /// Transient backend failure; an automatic restart may follow
    #[error("Capture stream interrupted: {reason}")]
    StreamInterrupted { reason: String },

    /// Too many automatic restarts inside the rolling window
    #[error("Restart budget exhausted: {restarts} restarts within {window:?}")]
    RestartExhausted { restarts: u32, window: Duration },

    /// A consumer callback panicked; the stream is unaffected
    #[error("Consumer callback failed: {reason}")]
    CallbackFault { reason: String },
}

impl SessionError {
    /// Whether this error ends the session
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionError::SourceUnavailable { .. } | SessionError::RestartExhausted { .. }
        )
    }
}

/// Top-level error type for Vigil operations
///
/// Wraps the domain-specific errors and provides automatic conversion
/// via the `From` trait, enabling seamless error propagation with `?`.
#[derive(Debug, Error)]
pub enum VigilError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Capture backend errors
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// Session failures
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Logger errors
    #[error("Logger error: {0}")]
    Logger(#[from] LoggerError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Parse error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
