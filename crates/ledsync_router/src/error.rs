//! Error types for routing operations.

use thiserror::Error;

use ledsync_core::CoreError;
use ledsync_store::StoreError;

use crate::session::ParticipantId;

/// Result type for routing operations.
pub type RouterResult<T> = Result<T, RouterError>;

/// Errors produced while handling participant events.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The action was rejected by the entity store.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The persistence write or read failed; the action was not published.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A participant sent an event before announcing a role.
    #[error("participant {participant} has not joined")]
    NotJoined {
        /// The offending participant.
        participant: ParticipantId,
    },

    /// An event for a participant the router has never seen.
    #[error("unknown participant {participant}")]
    UnknownParticipant {
        /// The unknown participant.
        participant: ParticipantId,
    },

    /// The pipeline's writer thread has shut down.
    #[error("action pipeline closed")]
    PipelineClosed,
}
