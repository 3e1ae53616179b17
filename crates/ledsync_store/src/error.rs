//! Error types for persistence operations.

use thiserror::Error;

/// Result type for persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by the persistence mapper and its backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend is unreachable or timed out.
    ///
    /// Actions whose persistence write surfaces this are rejected whole;
    /// the in-memory projection is left unchanged.
    #[error("persistence unavailable: {message}")]
    Unavailable {
        /// What failed.
        message: String,
    },

    /// Persisted records that cannot be zipped back into a valid model,
    /// e.g. an id present in an id set with no corresponding hash.
    #[error("persisted state corrupt: {message}")]
    Corrupt {
        /// What is inconsistent.
        message: String,
    },

    /// A backend reply of the wrong shape for the read that produced it.
    #[error("wrong reply shape: expected {expected}, got {got}")]
    WrongReply {
        /// The reply shape the read requires.
        expected: &'static str,
        /// The shape the backend returned.
        got: &'static str,
    },

    /// A persisted field that does not parse as its expected type.
    #[error("unparseable field {field}: {value:?}")]
    BadField {
        /// The hash field or list entry.
        field: String,
        /// The raw persisted value.
        value: String,
    },
}

impl StoreError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a corrupt-state error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }

    /// Creates a bad-field error.
    pub fn bad_field(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::BadField {
            field: field.into(),
            value: value.into(),
        }
    }
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        Self::Unavailable {
            message: err.to_string(),
        }
    }
}
