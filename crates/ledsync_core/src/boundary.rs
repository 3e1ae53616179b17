//! Pure segment-geometry transformations.
//!
//! Everything in this module is deterministic and free of I/O: functions take
//! a micro's segments in strip order and return the transformed segment list.
//! Callers (the entity store) own collection updates and invariant rechecks.
//!
//! Determinism matters beyond tidiness: web clients recompute the expected
//! geometry locally from the same action payloads, so the tie-break rules
//! here (odd-LED split bias, merge survivor identity) are part of the wire
//! contract, not an implementation detail.

use crate::entity::Segment;
use crate::error::{CoreError, CoreResult};
use crate::types::{Direction, Effect, SegmentId};

/// Computes the cut points between adjacent segments.
///
/// For segments `s0..sn-1` in strip order, returns the end index of every
/// segment except the last: `n - 1` values, strictly increasing. Empty for
/// zero or one segment.
pub fn compute_boundaries(segments: &[Segment]) -> Vec<u32> {
    if segments.len() <= 1 {
        return Vec::new();
    }
    segments[..segments.len() - 1]
        .iter()
        .map(Segment::end)
        .collect()
}

/// Result of splitting a segment in two.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitOutcome {
    /// The micro's segments after the split, in strip order.
    pub segments: Vec<Segment>,
    /// The id of the freshly created half.
    pub new_segment_id: SegmentId,
}

/// Result of merging a segment into a neighbor.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// The micro's segments after the merge, in strip order.
    pub segments: Vec<Segment>,
    /// The id of the absorbed (deleted) segment.
    pub deleted_segment_id: SegmentId,
}

/// Splits `segment_id` into two adjacent segments at its midpoint.
///
/// `direction` names the side on which the NEW segment is placed: the half on
/// that side receives `new_segment_id` and `new_effect`, while the half on the
/// opposite side keeps the original id and effect. When the LED count is odd
/// the original half keeps the extra LED.
///
/// Fails with `InvalidSplit` if the segment has fewer than two LEDs or is not
/// in `segments`.
pub fn split_segment(
    segments: &[Segment],
    segment_id: SegmentId,
    direction: Direction,
    new_effect: Effect,
    new_segment_id: SegmentId,
) -> CoreResult<SplitOutcome> {
    let index = position_of(segments, segment_id)
        .ok_or(CoreError::UnknownSegment { segment_id })?;
    let target = &segments[index];
    if target.num_leds < 2 {
        return Err(CoreError::invalid_split(format!(
            "segment {segment_id} has {} LED(s), need at least 2",
            target.num_leds
        )));
    }

    let new_len = target.num_leds / 2;
    let original_len = target.num_leds - new_len;

    let mut original = target.clone();
    let mut created = Segment {
        segment_id: new_segment_id,
        micro_id: target.micro_id,
        offset: 0,
        num_leds: new_len,
        effect: new_effect,
        effect_controlled_by: Default::default(),
    };
    match direction {
        // New half sits at the strip-left end of the old range.
        Direction::Left => {
            created.offset = target.offset;
            original.offset = target.offset + new_len;
            original.num_leds = original_len;
        }
        Direction::Right => {
            original.num_leds = original_len;
            created.offset = target.offset + original_len;
        }
    }

    let mut updated = segments.to_vec();
    updated[index] = original;
    match direction {
        Direction::Left => updated.insert(index, created),
        Direction::Right => updated.insert(index + 1, created),
    }

    Ok(SplitOutcome {
        segments: updated,
        new_segment_id,
    })
}

/// Merges `segment_id` into its `direction` neighbor.
///
/// The neighbor survives with its own id and effect, grown by the target's
/// LED count; the target is deleted. Fails with `NoNeighbor` when the target
/// is at the strip edge on the requested side.
pub fn merge_segments(
    segments: &[Segment],
    segment_id: SegmentId,
    direction: Direction,
) -> CoreResult<MergeOutcome> {
    let index = position_of(segments, segment_id)
        .ok_or(CoreError::UnknownSegment { segment_id })?;

    let neighbor_index = match direction {
        Direction::Left => {
            if index == 0 {
                return Err(CoreError::NoNeighbor {
                    segment_id,
                    direction,
                });
            }
            index - 1
        }
        Direction::Right => {
            if index + 1 == segments.len() {
                return Err(CoreError::NoNeighbor {
                    segment_id,
                    direction,
                });
            }
            index + 1
        }
    };

    let target = &segments[index];
    let mut updated = segments.to_vec();
    {
        let survivor = &mut updated[neighbor_index];
        survivor.num_leds += target.num_leds;
        // Absorbing rightward extends the neighbor's range down to the
        // target's start; absorbing leftward keeps the neighbor's offset.
        if direction == Direction::Right {
            survivor.offset = target.offset;
        }
    }
    updated.remove(index);

    Ok(MergeOutcome {
        segments: updated,
        deleted_segment_id: segment_id,
    })
}

/// Regeometries every segment to match a new boundary list.
///
/// Segment identity, effect, and relative order are preserved; only
/// `offset`/`num_leds` change. `new_boundaries` must be strictly increasing,
/// each value inside `(0, total_leds)`, with exactly one fewer entry than
/// there are segments.
pub fn resize_from_boundaries(
    segments: &[Segment],
    total_leds: u32,
    new_boundaries: &[u32],
) -> CoreResult<Vec<Segment>> {
    if segments.is_empty() {
        return Err(CoreError::invalid_boundaries("micro has no segments"));
    }
    if new_boundaries.len() != segments.len() - 1 {
        return Err(CoreError::invalid_boundaries(format!(
            "{} boundaries for {} segments, expected {}",
            new_boundaries.len(),
            segments.len(),
            segments.len() - 1
        )));
    }
    let mut previous = 0u32;
    for &boundary in new_boundaries {
        if boundary <= previous {
            return Err(CoreError::invalid_boundaries(format!(
                "boundary {boundary} does not increase past {previous}"
            )));
        }
        if boundary >= total_leds {
            return Err(CoreError::invalid_boundaries(format!(
                "boundary {boundary} is outside (0, {total_leds})"
            )));
        }
        previous = boundary;
    }

    let mut updated = segments.to_vec();
    let mut start = 0u32;
    for (i, segment) in updated.iter_mut().enumerate() {
        let end = new_boundaries.get(i).copied().unwrap_or(total_leds);
        segment.offset = start;
        segment.num_leds = end - start;
        start = end;
    }

    Ok(updated)
}

fn position_of(segments: &[Segment], segment_id: SegmentId) -> Option<usize> {
    segments.iter().position(|s| s.segment_id == segment_id)
}
