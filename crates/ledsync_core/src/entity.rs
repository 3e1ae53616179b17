//! Entity records and the normalized collections that hold them.
//!
//! Relationships are represented as plain ids stored on both sides
//! (Segment → Micro, SegmentGroup → Segments) and resolved through the
//! owning collection — never as owning pointers. A Segment may therefore
//! outlive a stale reference to it without memory-safety consequences.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::boundary::compute_boundaries;
use crate::error::{CoreError, CoreResult};
use crate::types::{Effect, EffectControl, GroupId, MicroId, SegmentId};

/// One microcontroller-managed LED strip.
///
/// `segment_ids` is ordered left to right along the strip.
/// `segment_boundaries` is derived from the owned segments and is never
/// edited independently of them; any divergence is a bug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Micro {
    /// Stable device identifier.
    pub micro_id: MicroId,
    /// Addressable strip length; immutable after creation.
    #[serde(rename = "totalLEDs")]
    pub total_leds: u32,
    /// Strip-wide brightness.
    pub brightness: u8,
    /// Owned segments in physical order.
    pub segment_ids: Vec<SegmentId>,
    /// Cut points between adjacent segments; length is
    /// `segment_ids.len() - 1`.
    pub segment_boundaries: Vec<u32>,
}

/// One contiguous LED range running one effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// Stable segment identifier.
    pub segment_id: SegmentId,
    /// Owning micro, as a back-reference by id.
    pub micro_id: MicroId,
    /// First LED of the range.
    pub offset: u32,
    /// Number of LEDs in the range.
    #[serde(rename = "numLEDs")]
    pub num_leds: u32,
    /// Effect the range is running.
    pub effect: Effect,
    /// Whether the effect is driven individually or by a group.
    pub effect_controlled_by: EffectControl,
}

impl Segment {
    /// LED index one past the end of this segment's range.
    pub fn end(&self) -> u32 {
        self.offset + self.num_leds
    }
}

/// A named set of segments whose effect is set together.
///
/// Members may span multiple micros. Groups are in-memory only; they are
/// not persisted and do not survive a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentGroup {
    /// Stable group identifier.
    pub group_id: GroupId,
    /// Member segments, kept sorted for deterministic iteration.
    pub segment_ids: BTreeSet<SegmentId>,
}

impl SegmentGroup {
    /// Creates an empty group.
    pub fn new(group_id: GroupId) -> Self {
        Self {
            group_id,
            segment_ids: BTreeSet::new(),
        }
    }
}

/// The normalized micro and segment collections.
///
/// This is both the `AddMicros` payload shape and the unit of full-state
/// persistence: everything a participant needs to reconstruct the fleet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MicrosAndSegments {
    /// Micros by id.
    pub micros: HashMap<MicroId, Micro>,
    /// Segments by id.
    pub segments: HashMap<SegmentId, Segment>,
}

impl MicrosAndSegments {
    /// True when no micros are present.
    pub fn is_empty(&self) -> bool {
        self.micros.is_empty()
    }
}

/// The authoritative normalized projection of the whole fleet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    /// Micros by id.
    pub micros: HashMap<MicroId, Micro>,
    /// Segments by id.
    pub segments: HashMap<SegmentId, Segment>,
    /// Segment groups by id.
    pub groups: HashMap<GroupId, SegmentGroup>,
}

impl EntityState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a state from persisted collections. Groups start empty; they
    /// are not persisted.
    pub fn from_collections(collections: MicrosAndSegments) -> Self {
        Self {
            micros: collections.micros,
            segments: collections.segments,
            groups: HashMap::new(),
        }
    }

    /// Returns the micro and segment collections as a detached snapshot.
    pub fn collections(&self) -> MicrosAndSegments {
        MicrosAndSegments {
            micros: self.micros.clone(),
            segments: self.segments.clone(),
        }
    }

    /// Looks up a micro.
    pub fn micro(&self, micro_id: MicroId) -> CoreResult<&Micro> {
        self.micros
            .get(&micro_id)
            .ok_or(CoreError::UnknownMicro { micro_id })
    }

    /// Looks up a segment.
    pub fn segment(&self, segment_id: SegmentId) -> CoreResult<&Segment> {
        self.segments
            .get(&segment_id)
            .ok_or(CoreError::UnknownSegment { segment_id })
    }

    /// Looks up a segment group.
    pub fn group(&self, group_id: GroupId) -> CoreResult<&SegmentGroup> {
        self.groups
            .get(&group_id)
            .ok_or(CoreError::UnknownGroup { group_id })
    }

    /// Returns one micro's segments in strip order.
    ///
    /// A listed id that does not resolve is an invariant 3 violation, not a
    /// lookup miss, and is reported as such.
    pub fn segments_of(&self, micro: &Micro) -> CoreResult<Vec<Segment>> {
        micro
            .segment_ids
            .iter()
            .map(|segment_id| {
                self.segments.get(segment_id).cloned().ok_or_else(|| {
                    CoreError::invariant_violation(
                        micro.micro_id,
                        format!("listed segment {segment_id} is missing from the collection"),
                    )
                })
            })
            .collect()
    }

    /// Checks the segment geometry invariants for one micro.
    ///
    /// Verifies that the segments in list order are contiguous and gapless
    /// across `0..total_leds`, that every listed segment back-references
    /// this micro, and that the stored boundaries equal the recomputed
    /// ones.
    pub fn check_micro_invariants(&self, micro_id: MicroId) -> CoreResult<()> {
        let micro = self.micro(micro_id)?;
        if micro.segment_ids.is_empty() {
            return Err(CoreError::invariant_violation(
                micro_id,
                "micro owns no segments",
            ));
        }

        let segments = self.segments_of(micro)?;
        let mut expected_offset = 0u32;
        for segment in &segments {
            if segment.micro_id != micro_id {
                return Err(CoreError::invariant_violation(
                    micro_id,
                    format!(
                        "segment {} back-references micro {}",
                        segment.segment_id, segment.micro_id
                    ),
                ));
            }
            if segment.offset != expected_offset {
                return Err(CoreError::invariant_violation(
                    micro_id,
                    format!(
                        "segment {} starts at {} instead of {}",
                        segment.segment_id, segment.offset, expected_offset
                    ),
                ));
            }
            // checked_add: a hostile payload can carry lengths that wrap
            // u32 before the coverage check would reject them.
            expected_offset = segment
                .offset
                .checked_add(segment.num_leds)
                .ok_or_else(|| {
                    CoreError::invariant_violation(
                        micro_id,
                        format!(
                            "segment {} length overflows the strip",
                            segment.segment_id
                        ),
                    )
                })?;
        }
        if expected_offset != micro.total_leds {
            return Err(CoreError::invariant_violation(
                micro_id,
                format!(
                    "segments cover {expected_offset} of {} LEDs",
                    micro.total_leds
                ),
            ));
        }

        let boundaries = compute_boundaries(&segments);
        if boundaries != micro.segment_boundaries {
            return Err(CoreError::invariant_violation(
                micro_id,
                format!(
                    "stored boundaries {:?} differ from derived {:?}",
                    micro.segment_boundaries, boundaries
                ),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn micro_with_two_segments() -> EntityState {
        let micro_id = MicroId::new(1);
        let s1 = Segment {
            segment_id: SegmentId::new(10),
            micro_id,
            offset: 0,
            num_leds: 60,
            effect: Effect::ColorWaves,
            effect_controlled_by: EffectControl::Individual,
        };
        let s2 = Segment {
            segment_id: SegmentId::new(11),
            micro_id,
            offset: 60,
            num_leds: 40,
            effect: Effect::BlendWave,
            effect_controlled_by: EffectControl::Individual,
        };
        let micro = Micro {
            micro_id,
            total_leds: 100,
            brightness: 128,
            segment_ids: vec![s1.segment_id, s2.segment_id],
            segment_boundaries: vec![60],
        };

        let mut state = EntityState::new();
        state.micros.insert(micro_id, micro);
        state.segments.insert(s1.segment_id, s1);
        state.segments.insert(s2.segment_id, s2);
        state
    }

    #[test]
    fn lookup_errors_name_the_missing_id() {
        let state = EntityState::new();
        assert_eq!(
            state.micro(MicroId::new(9)),
            Err(CoreError::UnknownMicro {
                micro_id: MicroId::new(9)
            })
        );
        assert_eq!(
            state.segment(SegmentId::new(9)),
            Err(CoreError::UnknownSegment {
                segment_id: SegmentId::new(9)
            })
        );
        assert_eq!(
            state.group(GroupId::new(9)),
            Err(CoreError::UnknownGroup {
                group_id: GroupId::new(9)
            })
        );
    }

    #[test]
    fn segments_of_preserves_list_order() {
        let state = micro_with_two_segments();
        let micro = state.micro(MicroId::new(1)).unwrap();
        let segments = state.segments_of(micro).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].segment_id, SegmentId::new(10));
        assert_eq!(segments[1].segment_id, SegmentId::new(11));
    }

    #[test]
    fn valid_micro_passes_invariant_check() {
        let state = micro_with_two_segments();
        assert!(state.check_micro_invariants(MicroId::new(1)).is_ok());
    }

    #[test]
    fn gap_between_segments_fails_invariant_check() {
        let mut state = micro_with_two_segments();
        state
            .segments
            .get_mut(&SegmentId::new(11))
            .unwrap()
            .offset = 70;
        let err = state.check_micro_invariants(MicroId::new(1)).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));
    }

    #[test]
    fn overlong_segment_fails_invariant_check_without_wrapping() {
        let mut state = micro_with_two_segments();
        state
            .segments
            .get_mut(&SegmentId::new(11))
            .unwrap()
            .num_leds = u32::MAX;
        let err = state.check_micro_invariants(MicroId::new(1)).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));
    }

    #[test]
    fn stale_boundaries_fail_invariant_check() {
        let mut state = micro_with_two_segments();
        state
            .micros
            .get_mut(&MicroId::new(1))
            .unwrap()
            .segment_boundaries = vec![50];
        let err = state.check_micro_invariants(MicroId::new(1)).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));
    }

    #[test]
    fn missing_listed_segment_fails_invariant_check() {
        let mut state = micro_with_two_segments();
        state.segments.remove(&SegmentId::new(11));
        let err = state.check_micro_invariants(MicroId::new(1)).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));
    }

    #[test]
    fn micro_serializes_with_wire_field_names() {
        let state = micro_with_two_segments();
        let micro = state.micro(MicroId::new(1)).unwrap();
        let json = serde_json::to_value(micro).unwrap();
        assert!(json.get("microId").is_some());
        assert!(json.get("totalLEDs").is_some());
        assert!(json.get("segmentBoundaries").is_some());

        let segment = state.segment(SegmentId::new(10)).unwrap();
        let json = serde_json::to_value(segment).unwrap();
        assert!(json.get("numLEDs").is_some());
        assert!(json.get("effectControlledBy").is_some());
    }
}
