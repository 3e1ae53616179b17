//! The fixed key grammar of the persistence mapping.
//!
//! Every record lives under one of these keys; the grammar is shared with
//! every other process reading the same backend, so it never changes shape.

use ledsync_core::{MicroId, SegmentId};

/// Set of all persisted micro ids.
pub const MICRO_ID_SET: &str = "MicroId.Set";
/// Set of all persisted segment ids.
pub const SEGMENT_ID_SET: &str = "SegmentId.Set";
/// Index of every key the mapper has written, for cleanup and diagnostics.
pub const KEY_INDEX_SET: &str = "Key.Set";

/// Hash of one micro's scalar fields.
pub fn micro_hash(micro_id: MicroId) -> String {
    format!("Micro.{micro_id}.Hash")
}

/// Ordered list of one micro's segment ids.
pub fn micro_segments_list(micro_id: MicroId) -> String {
    format!("Micro.{micro_id}.Segments.List")
}

/// Ordered list of one micro's segment boundaries.
pub fn micro_boundaries_list(micro_id: MicroId) -> String {
    format!("Micro.{micro_id}.SegmentBoundaries.List")
}

/// Hash of one segment's scalar fields.
pub fn segment_hash(segment_id: SegmentId) -> String {
    format!("Segment.{segment_id}.Hash")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_the_grammar() {
        assert_eq!(micro_hash(MicroId::new(7)), "Micro.7.Hash");
        assert_eq!(micro_segments_list(MicroId::new(7)), "Micro.7.Segments.List");
        assert_eq!(
            micro_boundaries_list(MicroId::new(7)),
            "Micro.7.SegmentBoundaries.List"
        );
        assert_eq!(segment_hash(SegmentId::new(12)), "Segment.12.Hash");
    }
}
