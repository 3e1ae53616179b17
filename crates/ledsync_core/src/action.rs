//! The closed set of state-mutating actions.
//!
//! Every mutation anywhere in the system is one of these variants, applied
//! through [`crate::store::EntityStore::apply`]. The serde shape is
//! `{ "type": "...", "payload": { ... } }`, matching the action envelopes the
//! transport carries.

use serde::{Deserialize, Serialize};

use crate::entity::MicrosAndSegments;
use crate::types::{Direction, Effect, GroupId, MicroId, SegmentId};

/// Payload of [`Action::SplitSegment`].
///
/// `new_segment_id` is generated by the action's originator and travels with
/// the payload so every replica materializes the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitSegmentPayload {
    /// Micro owning the target segment.
    pub micro_id: MicroId,
    /// Segment to split.
    pub segment_id: SegmentId,
    /// Side on which the new segment is placed.
    pub direction: Direction,
    /// Effect for the new half.
    pub new_effect: Effect,
    /// Id for the new half.
    pub new_segment_id: SegmentId,
}

/// Payload of [`Action::MergeSegments`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSegmentsPayload {
    /// Micro owning the target segment.
    pub micro_id: MicroId,
    /// Segment to merge away.
    pub segment_id: SegmentId,
    /// Neighbor that absorbs it.
    pub direction: Direction,
}

/// Payload of [`Action::SetSegmentEffect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSegmentEffectPayload {
    /// Micro owning the segment.
    pub micro_id: MicroId,
    /// Segment whose effect changes.
    pub segment_id: SegmentId,
    /// The effect to run.
    pub new_effect: Effect,
}

/// Payload of [`Action::SetGroupEffect`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetGroupEffectPayload {
    /// Group whose members change effect.
    pub group_id: GroupId,
    /// The effect to run.
    pub new_effect: Effect,
}

/// Payload of [`Action::SetMicroBrightness`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMicroBrightnessPayload {
    /// Micro whose brightness changes.
    pub micro_id: MicroId,
    /// New strip-wide brightness.
    pub brightness: u8,
}

/// Payload of [`Action::ResizeSegmentsFromBoundaries`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeSegmentsFromBoundariesPayload {
    /// Micro whose segments are regeometried.
    pub micro_id: MicroId,
    /// The new cut points.
    pub segment_boundaries: Vec<u32>,
}

/// Payload of [`Action::RemoveMicros`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveMicrosPayload {
    /// Micros to remove; their segments cascade.
    pub micro_ids: Vec<MicroId>,
}

/// Payload of group create/delete actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPayload {
    /// The group in question.
    pub group_id: GroupId,
}

/// Payload of group membership actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMembershipPayload {
    /// The group gaining or losing a member.
    pub group_id: GroupId,
    /// The member segment.
    pub segment_id: SegmentId,
}

/// A state mutation proposed by some participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Action {
    /// Bulk insert/merge of micros and their segments. Used both for
    /// first-seen microcontrollers and for resynchronizing a whole client.
    #[serde(rename = "ADD_MICROS")]
    AddMicros(MicrosAndSegments),

    /// Split one segment in two.
    #[serde(rename = "SPLIT_SEGMENT")]
    SplitSegment(SplitSegmentPayload),

    /// Merge one segment into a neighbor.
    #[serde(rename = "MERGE_SEGMENTS")]
    MergeSegments(MergeSegmentsPayload),

    /// Change one segment's effect.
    #[serde(rename = "SET_SEGMENT_EFFECT")]
    SetSegmentEffect(SetSegmentEffectPayload),

    /// Change the effect of every member of a group. Expanded into
    /// per-segment [`Action::SetSegmentEffect`] actions on apply.
    #[serde(rename = "SET_GROUP_EFFECT")]
    SetGroupEffect(SetGroupEffectPayload),

    /// Change one micro's brightness.
    #[serde(rename = "SET_MICRO_BRIGHTNESS")]
    SetMicroBrightness(SetMicroBrightnessPayload),

    /// Move every cut point of one micro at once.
    #[serde(rename = "RESIZE_SEGMENTS_FROM_BOUNDARIES")]
    ResizeSegmentsFromBoundaries(ResizeSegmentsFromBoundariesPayload),

    /// Remove micros and cascade-delete their segments.
    #[serde(rename = "REMOVE_MICROS")]
    RemoveMicros(RemoveMicrosPayload),

    /// Drop all state, in memory and in the persistence backend.
    #[serde(rename = "RESET_ALL_STATE")]
    ResetAllState,

    /// Create an empty segment group.
    #[serde(rename = "ADD_SEGMENT_GROUP")]
    AddSegmentGroup(GroupPayload),

    /// Delete a group; member segments revert to individual control.
    #[serde(rename = "REMOVE_SEGMENT_GROUP")]
    RemoveSegmentGroup(GroupPayload),

    /// Put a segment under a group's control.
    #[serde(rename = "ADD_SEGMENT_TO_GROUP")]
    AddSegmentToGroup(GroupMembershipPayload),

    /// Release a segment from a group's control.
    #[serde(rename = "REMOVE_SEGMENT_FROM_GROUP")]
    RemoveSegmentFromGroup(GroupMembershipPayload),
}

impl Action {
    /// The wire name of this action's kind, for logging and rejection
    /// messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Action::AddMicros(_) => "ADD_MICROS",
            Action::SplitSegment(_) => "SPLIT_SEGMENT",
            Action::MergeSegments(_) => "MERGE_SEGMENTS",
            Action::SetSegmentEffect(_) => "SET_SEGMENT_EFFECT",
            Action::SetGroupEffect(_) => "SET_GROUP_EFFECT",
            Action::SetMicroBrightness(_) => "SET_MICRO_BRIGHTNESS",
            Action::ResizeSegmentsFromBoundaries(_) => "RESIZE_SEGMENTS_FROM_BOUNDARIES",
            Action::RemoveMicros(_) => "REMOVE_MICROS",
            Action::ResetAllState => "RESET_ALL_STATE",
            Action::AddSegmentGroup(_) => "ADD_SEGMENT_GROUP",
            Action::RemoveSegmentGroup(_) => "REMOVE_SEGMENT_GROUP",
            Action::AddSegmentToGroup(_) => "ADD_SEGMENT_TO_GROUP",
            Action::RemoveSegmentFromGroup(_) => "REMOVE_SEGMENT_FROM_GROUP",
        }
    }

    /// The micro this action is addressed to, when it targets exactly one.
    pub fn target_micro(&self) -> Option<MicroId> {
        match self {
            Action::SplitSegment(p) => Some(p.micro_id),
            Action::MergeSegments(p) => Some(p.micro_id),
            Action::SetSegmentEffect(p) => Some(p.micro_id),
            Action::SetMicroBrightness(p) => Some(p.micro_id),
            Action::ResizeSegmentsFromBoundaries(p) => Some(p.micro_id),
            _ => None,
        }
    }

    /// True for the group lifecycle/membership kinds, which carry no
    /// hardware effect and are never forwarded to a micro channel.
    pub fn is_group_management(&self) -> bool {
        matches!(
            self,
            Action::AddSegmentGroup(_)
                | Action::RemoveSegmentGroup(_)
                | Action::AddSegmentToGroup(_)
                | Action::RemoveSegmentFromGroup(_)
        )
    }

    /// Creates a split action.
    pub fn split_segment(
        micro_id: MicroId,
        segment_id: SegmentId,
        direction: Direction,
        new_effect: Effect,
        new_segment_id: SegmentId,
    ) -> Self {
        Action::SplitSegment(SplitSegmentPayload {
            micro_id,
            segment_id,
            direction,
            new_effect,
            new_segment_id,
        })
    }

    /// Creates a merge action.
    pub fn merge_segments(micro_id: MicroId, segment_id: SegmentId, direction: Direction) -> Self {
        Action::MergeSegments(MergeSegmentsPayload {
            micro_id,
            segment_id,
            direction,
        })
    }

    /// Creates a set-segment-effect action.
    pub fn set_segment_effect(micro_id: MicroId, segment_id: SegmentId, new_effect: Effect) -> Self {
        Action::SetSegmentEffect(SetSegmentEffectPayload {
            micro_id,
            segment_id,
            new_effect,
        })
    }

    /// Creates a set-group-effect action.
    pub fn set_group_effect(group_id: GroupId, new_effect: Effect) -> Self {
        Action::SetGroupEffect(SetGroupEffectPayload {
            group_id,
            new_effect,
        })
    }

    /// Creates a brightness action.
    pub fn set_micro_brightness(micro_id: MicroId, brightness: u8) -> Self {
        Action::SetMicroBrightness(SetMicroBrightnessPayload {
            micro_id,
            brightness,
        })
    }

    /// Creates a resize action.
    pub fn resize_segments_from_boundaries(
        micro_id: MicroId,
        segment_boundaries: Vec<u32>,
    ) -> Self {
        Action::ResizeSegmentsFromBoundaries(ResizeSegmentsFromBoundariesPayload {
            micro_id,
            segment_boundaries,
        })
    }

    /// Creates a remove-micros action.
    pub fn remove_micros(micro_ids: Vec<MicroId>) -> Self {
        Action::RemoveMicros(RemoveMicrosPayload { micro_ids })
    }
}
