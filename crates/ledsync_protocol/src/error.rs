//! Error types for wire-level decoding.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors produced while decoding envelopes, events, or serial lines.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A message whose shape does not match the protocol.
    #[error("invalid message: {message}")]
    InvalidMessage {
        /// What was wrong with it.
        message: String,
    },

    /// A serial line whose leading tag is not in the protocol.
    #[error("unknown message tag: {tag}")]
    UnknownTag {
        /// The offending tag value.
        tag: i64,
    },

    /// An effect code outside the known enumeration.
    #[error("unknown effect code: {code}")]
    UnknownEffect {
        /// The offending code.
        code: i64,
    },

    /// A direction code outside the known enumeration.
    #[error("unknown direction code: {code}")]
    UnknownDirection {
        /// The offending code.
        code: i64,
    },

    /// A channel name that is neither a role group nor a micro id.
    #[error("unknown channel name: {name}")]
    UnknownChannel {
        /// The offending name.
        name: String,
    },

    /// The line was not valid JSON.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtocolError {
    /// Creates an invalid message error.
    pub fn invalid_message(message: impl Into<String>) -> Self {
        Self::InvalidMessage {
            message: message.into(),
        }
    }
}
