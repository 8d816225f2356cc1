//! Error types for stores and notifiers.

use serde_json::Error as SerdeError;
use thiserror::Error;

/// Errors emitted by settings stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The provided configuration was invalid.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(&'static str),
    /// Underlying I/O failure while reading or writing the backing file.
    #[error("i/o error: {source}")]
    Io {
        /// Source [`std::io::Error`].
        #[from]
        source: std::io::Error,
    },
    /// Serialization or deserialization error.
    #[error("serialization error: {source}")]
    Serialization {
        /// Source [`serde_json::Error`].
        #[from]
        source: SerdeError,
    },
    /// Backend reported an application error.
    #[error("store backend error: {reason}")]
    Backend {
        /// Human-readable reason describing the failure.
        reason: String,
    },
}

impl StoreError {
    /// Helper to construct backend errors from string-like values.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors emitted by change notifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The provided configuration was invalid.
    #[error("invalid notifier configuration: {0}")]
    InvalidConfig(&'static str),
    /// Channel names cannot be empty.
    #[error("notification channel name cannot be empty")]
    InvalidChannel,
    /// Transport reported an application error.
    #[error("notification backend error: {reason}")]
    Backend {
        /// Human-readable reason describing the failure.
        reason: String,
    },
}

impl NotifyError {
    /// Helper to construct backend errors from string-like values.
    #[must_use]
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Result type alias for notifier operations.
pub type NotifyResult<T> = Result<T, NotifyError>;
