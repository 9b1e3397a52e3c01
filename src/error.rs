//! Error types for archive-engine
//!
//! Every submitted unit of work terminates in a boolean result; errors in
//! this module either fail fast at construction time (validation) or are
//! recovered inside an operation and converted to an unsuccessful result.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for archive-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for archive-engine
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration or validation error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the issue
        message: String,
        /// The configuration key or parameter that caused the error (e.g., "compression_level")
        key: Option<String>,
    },

    /// I/O error during an operation
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unreadable archive
    #[error("codec error for {archive}: {reason}")]
    Codec {
        /// The archive the codec was working on
        archive: PathBuf,
        /// The reason the codec failed
        reason: String,
    },

    /// Operation was interrupted cooperatively — expected, not logged as an error
    #[error("operation interrupted")]
    Interrupted,

    /// `execute` was called on an already-completed operation
    #[error("operation already completed")]
    OperationCompleted,

    /// Output name contains illegal characters or is otherwise unusable
    #[error("invalid archive name '{name}': {reason}")]
    InvalidName {
        /// The offending name
        name: String,
        /// Why the name was rejected
        reason: String,
    },

    /// No codec is registered for the requested archive kind
    #[error("no codec registered for archive kind {kind}")]
    UnknownCodec {
        /// The archive kind that had no registered codec
        kind: String,
    },
}

impl Error {
    /// Convenience constructor for validation errors.
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Returns `true` if this error represents cooperative interruption.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Error::Interrupted)
    }
}
