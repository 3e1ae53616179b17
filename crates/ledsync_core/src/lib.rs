//! # ledsync core
//!
//! The entity model, boundary engine, and entity store for the ledsync
//! workspace: everything needed to hold and mutate the authoritative picture
//! of a fleet of LED-strip microcontrollers, with no I/O.
//!
//! ## Model
//!
//! - [`Micro`] — one microcontroller-managed strip, with an ordered segment
//!   list and derived cut points.
//! - [`Segment`] — one contiguous LED range running one [`Effect`].
//! - [`SegmentGroup`] — a set of segments whose effect is driven together.
//!
//! ## Mutation
//!
//! All change flows through the closed [`Action`] set, reduced one at a time
//! by the single-writer [`EntityStore`]. Segment-editing actions call into
//! the pure [`boundary`] functions; every accepted action leaves the
//! contiguous/gapless segment invariants intact, and a rejected action
//! changes nothing.
//!
//! ## Example
//!
//! ```rust
//! use ledsync_core::{Action, Direction, Effect, EntityStore, MicroId, SegmentId};
//! # use ledsync_core::{Micro, MicrosAndSegments, Segment};
//! # fn fleet() -> MicrosAndSegments {
//! #     let micro_id = MicroId::new(1);
//! #     let segment = Segment {
//! #         segment_id: SegmentId::new(10), micro_id, offset: 0, num_leds: 100,
//! #         effect: Effect::ColorWaves, effect_controlled_by: Default::default(),
//! #     };
//! #     let micro = Micro {
//! #         micro_id, total_leds: 100, brightness: 255,
//! #         segment_ids: vec![segment.segment_id], segment_boundaries: vec![],
//! #     };
//! #     let mut c = MicrosAndSegments::default();
//! #     c.micros.insert(micro_id, micro);
//! #     c.segments.insert(segment.segment_id, segment);
//! #     c
//! # }
//!
//! let mut store = EntityStore::new();
//! store.apply_and_commit(&Action::AddMicros(fleet())).unwrap();
//! store
//!     .apply_and_commit(&Action::split_segment(
//!         MicroId::new(1),
//!         SegmentId::new(10),
//!         Direction::Right,
//!         Effect::BlendWave,
//!         SegmentId::new(11),
//!     ))
//!     .unwrap();
//!
//! let micro = &store.state().micros[&MicroId::new(1)];
//! assert_eq!(micro.segment_boundaries, vec![50]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod boundary;
pub mod entity;
pub mod error;
pub mod store;
pub mod types;

pub use action::{
    Action, GroupMembershipPayload, GroupPayload, MergeSegmentsPayload, RemoveMicrosPayload,
    ResizeSegmentsFromBoundariesPayload, SetGroupEffectPayload, SetMicroBrightnessPayload,
    SetSegmentEffectPayload, SplitSegmentPayload,
};
pub use boundary::{compute_boundaries, MergeOutcome, SplitOutcome};
pub use entity::{EntityState, Micro, MicrosAndSegments, Segment, SegmentGroup};
pub use error::{CoreError, CoreResult};
pub use store::{ActionOutcome, AppliedAction, EntityStore};
pub use types::{Direction, Effect, EffectControl, GroupId, MicroId, SegmentId};
