//! Error types for the ledsync core.

use thiserror::Error;

use crate::types::{Direction, GroupId, MicroId, SegmentId};

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors produced by the boundary engine and the entity store.
///
/// All of these are caller-correctable rejections of a single action; the
/// state the action was applied against is left unchanged.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A split request that cannot be honored.
    #[error("invalid split: {message}")]
    InvalidSplit {
        /// Description of why the split is invalid.
        message: String,
    },

    /// The target segment has no neighbor on the requested side.
    #[error("segment {segment_id} has no {direction} neighbor")]
    NoNeighbor {
        /// The segment that was asked to merge.
        segment_id: SegmentId,
        /// The side on which a neighbor was required.
        direction: Direction,
    },

    /// A boundary list that does not fit the micro's segments.
    #[error("invalid boundaries: {message}")]
    InvalidBoundaries {
        /// Description of why the boundaries are invalid.
        message: String,
    },

    /// Reference to a micro that does not exist.
    #[error("unknown micro: {micro_id}")]
    UnknownMicro {
        /// The id that was not found.
        micro_id: MicroId,
    },

    /// Reference to a segment that does not exist.
    #[error("unknown segment: {segment_id}")]
    UnknownSegment {
        /// The id that was not found.
        segment_id: SegmentId,
    },

    /// Reference to a segment group that does not exist.
    #[error("unknown segment group: {group_id}")]
    UnknownGroup {
        /// The id that was not found.
        group_id: GroupId,
    },

    /// A group id that is already in use.
    #[error("segment group {group_id} already exists")]
    GroupExists {
        /// The colliding id.
        group_id: GroupId,
    },

    /// A post-apply check found state that violates the segment invariants.
    ///
    /// This should be impossible for any accepted action; it is a defensive
    /// check, fatal for the action but not for the process.
    #[error("invariant violation on micro {micro_id}: {message}")]
    InvariantViolation {
        /// The micro whose geometry is inconsistent.
        micro_id: MicroId,
        /// Description of the violated invariant.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid split error.
    pub fn invalid_split(message: impl Into<String>) -> Self {
        Self::InvalidSplit {
            message: message.into(),
        }
    }

    /// Creates an invalid boundaries error.
    pub fn invalid_boundaries(message: impl Into<String>) -> Self {
        Self::InvalidBoundaries {
            message: message.into(),
        }
    }

    /// Creates an invariant violation error.
    pub fn invariant_violation(micro_id: MicroId, message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            micro_id,
            message: message.into(),
        }
    }
}
