//! The single-writer entity store.
//!
//! All mutation goes through [`EntityStore::apply`], which reduces one action
//! against a copy of the current state and returns the staged result. Nothing
//! is published until [`EntityStore::commit`] swaps the staged state in; the
//! caller persists the staged state in between, so a persistence failure
//! leaves the in-memory projection untouched.

use std::collections::HashSet;

use tracing::warn;

use crate::action::Action;
use crate::boundary;
use crate::entity::{EntityState, SegmentGroup};
use crate::error::{CoreError, CoreResult};
use crate::types::{MicroId, SegmentId};

/// Extra facts about an applied action that the payload alone does not carry.
///
/// The persistence mapper needs these to build exact per-action write
/// batches, and the router needs the group expansion to route the synthesized
/// per-segment actions.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// Nothing beyond the payload.
    None,
    /// A merge happened; `survivor` absorbed `deleted`.
    Merged {
        /// Segment that grew.
        survivor: SegmentId,
        /// Segment that was removed.
        deleted: SegmentId,
    },
    /// Micros were removed, cascading these segments.
    Removed {
        /// Segments deleted alongside their micros.
        segment_ids: Vec<SegmentId>,
    },
    /// A group effect was expanded into per-segment actions.
    Expanded {
        /// One `SetSegmentEffect` per member segment, in member order.
        actions: Vec<Action>,
    },
}

/// One reduced action, staged but not yet published.
#[derive(Debug, Clone)]
pub struct AppliedAction {
    next: EntityState,
    outcome: ActionOutcome,
}

impl AppliedAction {
    /// The state the store will hold once this is committed.
    pub fn state(&self) -> &EntityState {
        &self.next
    }

    /// Facts recorded while reducing; see [`ActionOutcome`].
    pub fn outcome(&self) -> &ActionOutcome {
        &self.outcome
    }
}

/// The authoritative in-memory projection of the fleet.
///
/// Owned by exactly one writer; concurrent connections enqueue actions
/// rather than touching the store directly.
#[derive(Debug, Default)]
pub struct EntityStore {
    state: EntityState,
}

impl EntityStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store over previously reconstructed state.
    pub fn from_state(state: EntityState) -> Self {
        Self { state }
    }

    /// The current published state.
    pub fn state(&self) -> &EntityState {
        &self.state
    }

    /// Reduces one action against the current state.
    ///
    /// On success the returned [`AppliedAction`] holds the full next state;
    /// on error nothing changed. The reducer rechecks the segment-geometry
    /// invariants for every micro an action touches before accepting it.
    pub fn apply(&self, action: &Action) -> CoreResult<AppliedAction> {
        let mut next = self.state.clone();
        let outcome = reduce(&mut next, action)?;
        Ok(AppliedAction { next, outcome })
    }

    /// Publishes a staged action.
    pub fn commit(&mut self, applied: AppliedAction) {
        self.state = applied.next;
    }

    /// Convenience for callers without a persistence step in between.
    pub fn apply_and_commit(&mut self, action: &Action) -> CoreResult<ActionOutcome> {
        let applied = self.apply(action)?;
        let outcome = applied.outcome.clone();
        self.commit(applied);
        Ok(outcome)
    }
}

fn reduce(state: &mut EntityState, action: &Action) -> CoreResult<ActionOutcome> {
    match action {
        Action::AddMicros(collections) => {
            // A re-report of a known micro is legal (the resync flow depends
            // on it), but it may not change the strip length, and it may not
            // claim a segment id that a micro outside the payload owns.
            for (micro_id, micro) in &collections.micros {
                if let Some(existing) = state.micros.get(micro_id) {
                    if existing.total_leds != micro.total_leds {
                        return Err(CoreError::invariant_violation(
                            *micro_id,
                            format!(
                                "totalLEDs is immutable: reported {} over existing {}",
                                micro.total_leds, existing.total_leds
                            ),
                        ));
                    }
                }
            }
            for segment_id in collections.segments.keys() {
                if let Some(existing) = state.segments.get(segment_id) {
                    if !collections.micros.contains_key(&existing.micro_id) {
                        return Err(CoreError::invariant_violation(
                            existing.micro_id,
                            format!(
                                "segment {segment_id} already belongs to micro {}",
                                existing.micro_id
                            ),
                        ));
                    }
                }
            }
            for (micro_id, micro) in &collections.micros {
                state.micros.insert(*micro_id, micro.clone());
            }
            for (segment_id, segment) in &collections.segments {
                state.segments.insert(*segment_id, segment.clone());
            }
            for micro_id in collections.micros.keys() {
                state.check_micro_invariants(*micro_id)?;
            }
            Ok(ActionOutcome::None)
        }

        Action::SplitSegment(payload) => {
            if state.segments.contains_key(&payload.new_segment_id) {
                return Err(CoreError::invalid_split(format!(
                    "new segment id {} is already in use",
                    payload.new_segment_id
                )));
            }
            let micro = state.micro(payload.micro_id)?;
            if !micro.segment_ids.contains(&payload.segment_id) {
                return Err(CoreError::invalid_split(format!(
                    "segment {} does not belong to micro {}",
                    payload.segment_id, payload.micro_id
                )));
            }
            let segments = state.segments_of(micro)?;
            let split = boundary::split_segment(
                &segments,
                payload.segment_id,
                payload.direction,
                payload.new_effect,
                payload.new_segment_id,
            )?;
            replace_micro_segments(state, payload.micro_id, split.segments)?;
            state.check_micro_invariants(payload.micro_id)?;
            Ok(ActionOutcome::None)
        }

        Action::MergeSegments(payload) => {
            let micro = state.micro(payload.micro_id)?;
            if !micro.segment_ids.contains(&payload.segment_id) {
                return Err(CoreError::UnknownSegment {
                    segment_id: payload.segment_id,
                });
            }
            let segments = state.segments_of(micro)?;
            let merged =
                boundary::merge_segments(&segments, payload.segment_id, payload.direction)?;
            let deleted = merged.deleted_segment_id;
            let survivor = survivor_of(&segments, &merged.segments, deleted);
            replace_micro_segments(state, payload.micro_id, merged.segments)?;
            state.segments.remove(&deleted);
            prune_segment_from_groups(state, deleted);
            state.check_micro_invariants(payload.micro_id)?;
            Ok(ActionOutcome::Merged { survivor, deleted })
        }

        Action::SetSegmentEffect(payload) => {
            let segment = state
                .segments
                .get_mut(&payload.segment_id)
                .ok_or(CoreError::UnknownSegment {
                    segment_id: payload.segment_id,
                })?;
            segment.effect = payload.new_effect;
            Ok(ActionOutcome::None)
        }

        Action::SetGroupEffect(payload) => {
            let group = state.group(payload.group_id)?.clone();
            let mut actions = Vec::with_capacity(group.segment_ids.len());
            for segment_id in &group.segment_ids {
                let segment = state.segment(*segment_id)?;
                actions.push(Action::set_segment_effect(
                    segment.micro_id,
                    *segment_id,
                    payload.new_effect,
                ));
            }
            for expanded in &actions {
                reduce(state, expanded)?;
            }
            Ok(ActionOutcome::Expanded { actions })
        }

        Action::SetMicroBrightness(payload) => {
            let micro = state
                .micros
                .get_mut(&payload.micro_id)
                .ok_or(CoreError::UnknownMicro {
                    micro_id: payload.micro_id,
                })?;
            micro.brightness = payload.brightness;
            Ok(ActionOutcome::None)
        }

        Action::ResizeSegmentsFromBoundaries(payload) => {
            let micro = state.micro(payload.micro_id)?;
            let total_leds = micro.total_leds;
            let segments = state.segments_of(micro)?;
            let resized = boundary::resize_from_boundaries(
                &segments,
                total_leds,
                &payload.segment_boundaries,
            )?;
            replace_micro_segments(state, payload.micro_id, resized)?;
            state.check_micro_invariants(payload.micro_id)?;
            Ok(ActionOutcome::None)
        }

        Action::RemoveMicros(payload) => {
            let mut removed_segments = Vec::new();
            for micro_id in &payload.micro_ids {
                let micro = state.micro(*micro_id)?;
                removed_segments.extend(micro.segment_ids.clone());
            }
            for micro_id in &payload.micro_ids {
                state.micros.remove(micro_id);
            }
            for segment_id in &removed_segments {
                state.segments.remove(segment_id);
                prune_segment_from_groups(state, *segment_id);
            }
            Ok(ActionOutcome::Removed {
                segment_ids: removed_segments,
            })
        }

        Action::ResetAllState => {
            *state = EntityState::new();
            Ok(ActionOutcome::None)
        }

        Action::AddSegmentGroup(payload) => {
            if state.groups.contains_key(&payload.group_id) {
                return Err(CoreError::GroupExists {
                    group_id: payload.group_id,
                });
            }
            state
                .groups
                .insert(payload.group_id, SegmentGroup::new(payload.group_id));
            Ok(ActionOutcome::None)
        }

        Action::RemoveSegmentGroup(payload) => {
            let group = state
                .groups
                .remove(&payload.group_id)
                .ok_or(CoreError::UnknownGroup {
                    group_id: payload.group_id,
                })?;
            for segment_id in &group.segment_ids {
                // Members may already be gone; deleting a group never
                // deletes segments.
                if let Some(segment) = state.segments.get_mut(segment_id) {
                    segment.effect_controlled_by = Default::default();
                }
            }
            Ok(ActionOutcome::None)
        }

        Action::AddSegmentToGroup(payload) => {
            state.group(payload.group_id)?;
            state.segment(payload.segment_id)?;
            if let Some(group) = state.groups.get_mut(&payload.group_id) {
                group.segment_ids.insert(payload.segment_id);
            }
            if let Some(segment) = state.segments.get_mut(&payload.segment_id) {
                segment.effect_controlled_by =
                    crate::types::EffectControl::Group(payload.group_id);
            }
            Ok(ActionOutcome::None)
        }

        Action::RemoveSegmentFromGroup(payload) => {
            state.group(payload.group_id)?;
            if let Some(group) = state.groups.get_mut(&payload.group_id) {
                group.segment_ids.remove(&payload.segment_id);
            }
            if let Some(segment) = state.segments.get_mut(&payload.segment_id) {
                segment.effect_controlled_by = Default::default();
            }
            Ok(ActionOutcome::None)
        }
    }
}

/// Installs a recomputed segment list on a micro: updates the global segment
/// collection, the micro's ordered id list, and its derived boundaries.
fn replace_micro_segments(
    state: &mut EntityState,
    micro_id: MicroId,
    segments: Vec<crate::entity::Segment>,
) -> CoreResult<()> {
    let boundaries = boundary::compute_boundaries(&segments);
    let ids: Vec<SegmentId> = segments.iter().map(|s| s.segment_id).collect();
    for segment in segments {
        state.segments.insert(segment.segment_id, segment);
    }
    let micro = state
        .micros
        .get_mut(&micro_id)
        .ok_or(CoreError::UnknownMicro { micro_id })?;
    micro.segment_ids = ids;
    micro.segment_boundaries = boundaries;
    Ok(())
}

/// Finds which segment grew across a merge: the one present in both lists
/// that is not the deleted id and whose geometry changed.
fn survivor_of(
    before: &[crate::entity::Segment],
    after: &[crate::entity::Segment],
    deleted: SegmentId,
) -> SegmentId {
    let unchanged: HashSet<_> = before
        .iter()
        .map(|s| (s.segment_id, s.offset, s.num_leds))
        .collect();
    for segment in after {
        if segment.segment_id != deleted
            && !unchanged.contains(&(segment.segment_id, segment.offset, segment.num_leds))
        {
            return segment.segment_id;
        }
    }
    // Unreachable for any merge the boundary engine accepts.
    warn!(%deleted, "merge produced no grown survivor");
    deleted
}

fn prune_segment_from_groups(state: &mut EntityState, segment_id: SegmentId) {
    for group in state.groups.values_mut() {
        group.segment_ids.remove(&segment_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Micro, MicrosAndSegments, Segment};
    use crate::types::{Direction, Effect, EffectControl, GroupId};

    fn single_micro() -> MicrosAndSegments {
        let micro_id = MicroId::new(1);
        let segment = Segment {
            segment_id: SegmentId::new(10),
            micro_id,
            offset: 0,
            num_leds: 100,
            effect: Effect::ColorWaves,
            effect_controlled_by: EffectControl::Individual,
        };
        let micro = Micro {
            micro_id,
            total_leds: 100,
            brightness: 255,
            segment_ids: vec![segment.segment_id],
            segment_boundaries: vec![],
        };
        let mut collections = MicrosAndSegments::default();
        collections.micros.insert(micro_id, micro);
        collections.segments.insert(segment.segment_id, segment);
        collections
    }

    fn store_with_micro() -> EntityStore {
        let mut store = EntityStore::new();
        store
            .apply_and_commit(&Action::AddMicros(single_micro()))
            .unwrap();
        store
    }

    #[test]
    fn add_micros_rejects_broken_geometry() {
        let mut collections = single_micro();
        collections
            .segments
            .get_mut(&SegmentId::new(10))
            .unwrap()
            .num_leds = 90;

        let store = EntityStore::new();
        let err = store.apply(&Action::AddMicros(collections)).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));
        assert!(store.state().micros.is_empty());
    }

    #[test]
    fn add_micros_rejects_segment_owned_by_another_micro() {
        let store = store_with_micro();

        // A second gateway's device happens to report the same segment id.
        let micro_id = MicroId::new(2);
        let segment = Segment {
            segment_id: SegmentId::new(10),
            micro_id,
            offset: 0,
            num_leds: 30,
            effect: Effect::BlendWave,
            effect_controlled_by: EffectControl::Individual,
        };
        let micro = Micro {
            micro_id,
            total_leds: 30,
            brightness: 255,
            segment_ids: vec![segment.segment_id],
            segment_boundaries: vec![],
        };
        let mut collections = MicrosAndSegments::default();
        collections.micros.insert(micro_id, micro);
        collections.segments.insert(segment.segment_id, segment);

        let err = store.apply(&Action::AddMicros(collections)).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));
        assert_eq!(
            store.state().segments[&SegmentId::new(10)].micro_id,
            MicroId::new(1)
        );
    }

    #[test]
    fn add_micros_rejects_changed_total_leds() {
        let mut store = store_with_micro();

        let mut shrunk = single_micro();
        shrunk.micros.get_mut(&MicroId::new(1)).unwrap().total_leds = 60;
        shrunk
            .segments
            .get_mut(&SegmentId::new(10))
            .unwrap()
            .num_leds = 60;
        let err = store.apply(&Action::AddMicros(shrunk)).unwrap_err();
        assert!(matches!(err, CoreError::InvariantViolation { .. }));
        assert_eq!(store.state().micros[&MicroId::new(1)].total_leds, 100);

        // An identical re-report stays legal.
        store
            .apply_and_commit(&Action::AddMicros(single_micro()))
            .unwrap();
    }

    #[test]
    fn apply_does_not_publish_until_commit() {
        let store = store_with_micro();
        let applied = store
            .apply(&Action::set_micro_brightness(MicroId::new(1), 10))
            .unwrap();

        assert_eq!(applied.state().micros[&MicroId::new(1)].brightness, 10);
        assert_eq!(store.state().micros[&MicroId::new(1)].brightness, 255);
    }

    #[test]
    fn split_updates_lists_and_boundaries() {
        let mut store = store_with_micro();
        store
            .apply_and_commit(&Action::split_segment(
                MicroId::new(1),
                SegmentId::new(10),
                Direction::Right,
                Effect::BlendWave,
                SegmentId::new(11),
            ))
            .unwrap();

        let micro = &store.state().micros[&MicroId::new(1)];
        assert_eq!(
            micro.segment_ids,
            vec![SegmentId::new(10), SegmentId::new(11)]
        );
        assert_eq!(micro.segment_boundaries, vec![50]);
        assert_eq!(store.state().segments.len(), 2);
        assert_eq!(
            store.state().segments[&SegmentId::new(11)].effect,
            Effect::BlendWave
        );
    }

    #[test]
    fn split_rejects_colliding_new_id() {
        let store = store_with_micro();
        let err = store
            .apply(&Action::split_segment(
                MicroId::new(1),
                SegmentId::new(10),
                Direction::Right,
                Effect::BlendWave,
                SegmentId::new(10),
            ))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSplit { .. }));
    }

    #[test]
    fn split_rejects_segment_of_another_micro() {
        let mut store = store_with_micro();
        let mut other = single_micro();
        let other_micro = other.micros.remove(&MicroId::new(1)).unwrap();
        let mut collections = MicrosAndSegments::default();
        let mut micro = other_micro;
        micro.micro_id = MicroId::new(2);
        micro.segment_ids = vec![SegmentId::new(20)];
        let mut segment = other.segments.remove(&SegmentId::new(10)).unwrap();
        segment.segment_id = SegmentId::new(20);
        segment.micro_id = MicroId::new(2);
        collections.micros.insert(micro.micro_id, micro);
        collections.segments.insert(segment.segment_id, segment);
        store
            .apply_and_commit(&Action::AddMicros(collections))
            .unwrap();

        let err = store
            .apply(&Action::split_segment(
                MicroId::new(2),
                SegmentId::new(10),
                Direction::Right,
                Effect::BlendWave,
                SegmentId::new(30),
            ))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSplit { .. }));
    }

    #[test]
    fn merge_removes_segment_everywhere() {
        let mut store = store_with_micro();
        store
            .apply_and_commit(&Action::split_segment(
                MicroId::new(1),
                SegmentId::new(10),
                Direction::Right,
                Effect::BlendWave,
                SegmentId::new(11),
            ))
            .unwrap();

        let outcome = store
            .apply_and_commit(&Action::merge_segments(
                MicroId::new(1),
                SegmentId::new(11),
                Direction::Left,
            ))
            .unwrap();

        assert_eq!(
            outcome,
            ActionOutcome::Merged {
                survivor: SegmentId::new(10),
                deleted: SegmentId::new(11),
            }
        );
        let micro = &store.state().micros[&MicroId::new(1)];
        assert_eq!(micro.segment_ids, vec![SegmentId::new(10)]);
        assert!(micro.segment_boundaries.is_empty());
        assert!(!store.state().segments.contains_key(&SegmentId::new(11)));
        assert_eq!(store.state().segments[&SegmentId::new(10)].num_leds, 100);
    }

    #[test]
    fn merge_prunes_group_membership() {
        let mut store = store_with_micro();
        store
            .apply_and_commit(&Action::split_segment(
                MicroId::new(1),
                SegmentId::new(10),
                Direction::Right,
                Effect::BlendWave,
                SegmentId::new(11),
            ))
            .unwrap();
        let group_id = GroupId::new(5);
        store
            .apply_and_commit(&Action::AddSegmentGroup(crate::action::GroupPayload {
                group_id,
            }))
            .unwrap();
        store
            .apply_and_commit(&Action::AddSegmentToGroup(
                crate::action::GroupMembershipPayload {
                    group_id,
                    segment_id: SegmentId::new(11),
                },
            ))
            .unwrap();

        store
            .apply_and_commit(&Action::merge_segments(
                MicroId::new(1),
                SegmentId::new(11),
                Direction::Left,
            ))
            .unwrap();

        assert!(store.state().groups[&group_id].segment_ids.is_empty());
    }

    #[test]
    fn group_effect_expands_to_member_segments() {
        let mut store = store_with_micro();
        store
            .apply_and_commit(&Action::split_segment(
                MicroId::new(1),
                SegmentId::new(10),
                Direction::Right,
                Effect::ColorWaves,
                SegmentId::new(11),
            ))
            .unwrap();
        let group_id = GroupId::new(7);
        store
            .apply_and_commit(&Action::AddSegmentGroup(crate::action::GroupPayload {
                group_id,
            }))
            .unwrap();
        for id in [10, 11] {
            store
                .apply_and_commit(&Action::AddSegmentToGroup(
                    crate::action::GroupMembershipPayload {
                        group_id,
                        segment_id: SegmentId::new(id),
                    },
                ))
                .unwrap();
        }

        let outcome = store
            .apply_and_commit(&Action::set_group_effect(group_id, Effect::BlendWave))
            .unwrap();

        match outcome {
            ActionOutcome::Expanded { actions } => {
                assert_eq!(actions.len(), 2);
                for action in &actions {
                    assert!(matches!(action, Action::SetSegmentEffect(_)));
                }
            }
            other => panic!("expected expansion, got {other:?}"),
        }
        for id in [10, 11] {
            assert_eq!(
                store.state().segments[&SegmentId::new(id)].effect,
                Effect::BlendWave
            );
        }
    }

    #[test]
    fn remove_micros_cascades_segments() {
        let mut store = store_with_micro();
        let outcome = store
            .apply_and_commit(&Action::remove_micros(vec![MicroId::new(1)]))
            .unwrap();

        assert_eq!(
            outcome,
            ActionOutcome::Removed {
                segment_ids: vec![SegmentId::new(10)],
            }
        );
        assert!(store.state().micros.is_empty());
        assert!(store.state().segments.is_empty());
    }

    #[test]
    fn remove_unknown_micro_is_rejected_whole() {
        let mut store = store_with_micro();
        let err = store
            .apply_and_commit(&Action::remove_micros(vec![
                MicroId::new(1),
                MicroId::new(99),
            ]))
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownMicro { .. }));
        assert_eq!(store.state().micros.len(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = store_with_micro();
        store.apply_and_commit(&Action::ResetAllState).unwrap();
        assert!(store.state().micros.is_empty());
        assert!(store.state().segments.is_empty());
        assert!(store.state().groups.is_empty());
    }

    #[test]
    fn removing_group_releases_members() {
        let mut store = store_with_micro();
        let group_id = GroupId::new(2);
        store
            .apply_and_commit(&Action::AddSegmentGroup(crate::action::GroupPayload {
                group_id,
            }))
            .unwrap();
        store
            .apply_and_commit(&Action::AddSegmentToGroup(
                crate::action::GroupMembershipPayload {
                    group_id,
                    segment_id: SegmentId::new(10),
                },
            ))
            .unwrap();
        assert_eq!(
            store.state().segments[&SegmentId::new(10)].effect_controlled_by,
            EffectControl::Group(group_id)
        );

        store
            .apply_and_commit(&Action::RemoveSegmentGroup(crate::action::GroupPayload {
                group_id,
            }))
            .unwrap();

        assert!(store.state().groups.is_empty());
        assert_eq!(
            store.state().segments[&SegmentId::new(10)].effect_controlled_by,
            EffectControl::Individual
        );
        // The segment itself is untouched.
        assert!(store.state().segments.contains_key(&SegmentId::new(10)));
    }

    #[test]
    fn duplicate_group_id_is_rejected() {
        let mut store = store_with_micro();
        let group_id = GroupId::new(2);
        let add = Action::AddSegmentGroup(crate::action::GroupPayload { group_id });
        store.apply_and_commit(&add).unwrap();
        let err = store.apply_and_commit(&add).unwrap_err();
        assert!(matches!(err, CoreError::GroupExists { .. }));
    }
}
