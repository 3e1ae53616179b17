//! Canonical fleet fixtures.
//!
//! Every fixture satisfies the segment geometry invariants, so tests can
//! feed them straight into an `EntityStore` or a persistence mapper without
//! setup code of their own.

use ledsync_core::{
    compute_boundaries, Effect, EffectControl, Micro, MicroId, MicrosAndSegments, Segment,
    SegmentId,
};

/// The micro every single-micro fixture uses.
pub const MICRO_ONE: MicroId = MicroId::new(1);
/// The second micro of [`two_micro_fleet`].
pub const MICRO_TWO: MicroId = MicroId::new(2);
/// The sole segment of [`single_micro_fleet`].
pub const SEGMENT_ONE: SegmentId = SegmentId::new(10);
/// The second segment of [`split_micro_fleet`].
pub const SEGMENT_TWO: SegmentId = SegmentId::new(11);
/// The segment owned by [`MICRO_TWO`] in [`two_micro_fleet`].
pub const SEGMENT_THREE: SegmentId = SegmentId::new(20);

/// Builds a segment with individual effect control.
pub fn segment(
    segment_id: SegmentId,
    micro_id: MicroId,
    offset: u32,
    num_leds: u32,
    effect: Effect,
) -> Segment {
    Segment {
        segment_id,
        micro_id,
        offset,
        num_leds,
        effect,
        effect_controlled_by: EffectControl::Individual,
    }
}

/// Builds a micro from its segments, deriving order and boundaries.
///
/// The segments must tile `0..total_leds`; the micro's `total_leds` is
/// taken from where the last segment ends.
pub fn micro(micro_id: MicroId, brightness: u8, mut segments: Vec<Segment>) -> Micro {
    segments.sort_by_key(|segment| segment.offset);
    let total_leds = segments.last().map_or(0, Segment::end);
    Micro {
        micro_id,
        total_leds,
        brightness,
        segment_ids: segments.iter().map(|segment| segment.segment_id).collect(),
        segment_boundaries: compute_boundaries(&segments),
    }
}

/// Builds collections from a list of micros and their segments.
pub fn fleet(micros: Vec<Micro>, segments: Vec<Segment>) -> MicrosAndSegments {
    let mut collections = MicrosAndSegments::default();
    for micro in micros {
        collections.micros.insert(micro.micro_id, micro);
    }
    for segment in segments {
        collections.segments.insert(segment.segment_id, segment);
    }
    collections
}

/// A micro covering `total_leds` LEDs with one full-width segment.
pub fn single_segment_micro(
    micro_id: MicroId,
    segment_id: SegmentId,
    total_leds: u32,
) -> MicrosAndSegments {
    let segment = segment(segment_id, micro_id, 0, total_leds, Effect::ColorWaves);
    let micro = micro(micro_id, 255, vec![segment.clone()]);
    fleet(vec![micro], vec![segment])
}

/// One 100-LED micro with a single segment running color waves.
pub fn single_micro_fleet() -> MicrosAndSegments {
    single_segment_micro(MICRO_ONE, SEGMENT_ONE, 100)
}

/// One 100-LED micro already split 60/40 into two segments.
pub fn split_micro_fleet() -> MicrosAndSegments {
    let first = segment(SEGMENT_ONE, MICRO_ONE, 0, 60, Effect::ColorWaves);
    let second = segment(SEGMENT_TWO, MICRO_ONE, 60, 40, Effect::BlendWave);
    let micro = micro(MICRO_ONE, 128, vec![first.clone(), second.clone()]);
    fleet(vec![micro], vec![first, second])
}

/// Two micros: the split 100-LED micro plus a 30-LED single-segment micro.
pub fn two_micro_fleet() -> MicrosAndSegments {
    let mut collections = split_micro_fleet();
    let extra = segment(SEGMENT_THREE, MICRO_TWO, 0, 30, Effect::BlendWave);
    let second_micro = micro(MICRO_TWO, 200, vec![extra.clone()]);
    collections.micros.insert(MICRO_TWO, second_micro);
    collections.segments.insert(SEGMENT_THREE, extra);
    collections
}
