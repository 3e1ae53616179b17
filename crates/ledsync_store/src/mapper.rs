//! Maps the entity collections onto the key-value backend and back.
//!
//! One logical action becomes one write batch; a full reconstruction is two
//! pipelined round trips (the keys of the second are not known until the id
//! sets arrive). Every key a batch writes is also added to the key index set
//! in the same batch.

use tracing::debug;

use ledsync_core::{
    Action, ActionOutcome, Effect, EffectControl, EntityState, Micro, MicroId, MicrosAndSegments,
    Segment, SegmentId,
};

use crate::backend::{KvBackend, KvCommand, KvRead, KvReply};
use crate::error::{StoreError, StoreResult};
use crate::keys;

/// Mirrors the entity store into a key-value backend.
///
/// One instance per process, constructor-injected wherever persistence is
/// needed; the backend underneath may be shared with other processes.
pub struct PersistenceMapper {
    backend: Box<dyn KvBackend>,
}

impl PersistenceMapper {
    /// Creates a mapper over a backend.
    pub fn new(backend: Box<dyn KvBackend>) -> Self {
        Self { backend }
    }

    /// Writes the full collections in one batch.
    ///
    /// Used when a light client resynchronizes a whole fleet and by
    /// round-trip tests; per-action writes use [`Self::write_action`].
    pub fn write_all(&self, collections: &MicrosAndSegments) -> StoreResult<()> {
        let mut batch = Vec::new();
        push_collections(&mut batch, collections);
        self.backend.execute(&batch)
    }

    /// Writes the exact records one applied action changed.
    ///
    /// `state` is the staged post-apply state; `outcome` carries the facts
    /// (deleted ids, expansions) the payload alone does not.
    ///
    /// # Errors
    ///
    /// [`StoreError::Unavailable`] if the batch is not acknowledged; the
    /// caller must then discard the staged state rather than publish it.
    pub fn write_action(
        &self,
        state: &EntityState,
        action: &Action,
        outcome: &ActionOutcome,
    ) -> StoreResult<()> {
        let mut batch = Vec::new();
        self.push_action(&mut batch, state, action, outcome)?;
        if batch.is_empty() {
            return Ok(());
        }
        debug!(kind = action.kind(), commands = batch.len(), "persisting action");
        self.backend.execute(&batch)
    }

    /// Reconstructs the full collections.
    ///
    /// Two phases: read both id sets, then one pipelined batch of every
    /// hash and list those ids name, zipped back by position.
    ///
    /// # Errors
    ///
    /// Fails whole rather than returning a partial model: an id with no
    /// corresponding hash is [`StoreError::Corrupt`], and any backend
    /// failure in either phase is [`StoreError::Unavailable`].
    pub fn read_all(&self) -> StoreResult<MicrosAndSegments> {
        let id_replies = self.backend.query(&[
            KvRead::SetMembers {
                key: keys::MICRO_ID_SET.to_string(),
            },
            KvRead::SetMembers {
                key: keys::SEGMENT_ID_SET.to_string(),
            },
        ])?;
        let micro_ids = parse_id_set::<MicroId>(expect_members(&id_replies[0])?, "micro id")?;
        let segment_ids =
            parse_id_set::<SegmentId>(expect_members(&id_replies[1])?, "segment id")?;

        let mut reads = Vec::with_capacity(micro_ids.len() * 3 + segment_ids.len());
        for micro_id in &micro_ids {
            reads.push(KvRead::HashGetAll {
                key: keys::micro_hash(*micro_id),
            });
            reads.push(KvRead::ListRange {
                key: keys::micro_segments_list(*micro_id),
            });
            reads.push(KvRead::ListRange {
                key: keys::micro_boundaries_list(*micro_id),
            });
        }
        for segment_id in &segment_ids {
            reads.push(KvRead::HashGetAll {
                key: keys::segment_hash(*segment_id),
            });
        }
        let replies = self.backend.query(&reads)?;

        let mut collections = MicrosAndSegments::default();
        for (position, micro_id) in micro_ids.iter().enumerate() {
            let base = position * 3;
            let fields = expect_hash(&replies[base])?;
            let segment_list = expect_list(&replies[base + 1])?;
            let boundary_list = expect_list(&replies[base + 2])?;
            let micro = parse_micro(*micro_id, fields, segment_list, boundary_list)?;
            collections.micros.insert(*micro_id, micro);
        }
        let segments_base = micro_ids.len() * 3;
        for (position, segment_id) in segment_ids.iter().enumerate() {
            let fields = expect_hash(&replies[segments_base + position])?;
            let segment = parse_segment(*segment_id, fields)?;
            collections.segments.insert(*segment_id, segment);
        }

        debug!(
            micros = collections.micros.len(),
            segments = collections.segments.len(),
            "reconstructed collections"
        );
        Ok(collections)
    }

    /// Drops every persisted record.
    pub fn flush_all(&self) -> StoreResult<()> {
        self.backend.flush_all()
    }

    fn push_action(
        &self,
        batch: &mut Vec<KvCommand>,
        state: &EntityState,
        action: &Action,
        outcome: &ActionOutcome,
    ) -> StoreResult<()> {
        match action {
            Action::AddMicros(collections) => {
                push_collections(batch, collections);
            }

            Action::SplitSegment(payload) => {
                let micro = micro_of(state, payload.micro_id)?;
                push_set_add(batch, keys::SEGMENT_ID_SET, payload.new_segment_id.to_string());
                push_micro_lists(batch, micro);
                push_segment_hash(batch, segment_of(state, payload.segment_id)?);
                push_segment_hash(batch, segment_of(state, payload.new_segment_id)?);
            }

            Action::MergeSegments(payload) => {
                let ActionOutcome::Merged { survivor, deleted } = outcome else {
                    return Err(StoreError::corrupt("merge applied without merge outcome"));
                };
                let micro = micro_of(state, payload.micro_id)?;
                push_micro_lists(batch, micro);
                push_segment_hash(batch, segment_of(state, *survivor)?);
                batch.push(KvCommand::SetRemove {
                    key: keys::SEGMENT_ID_SET.to_string(),
                    member: deleted.to_string(),
                });
                batch.push(KvCommand::Delete {
                    key: keys::segment_hash(*deleted),
                });
            }

            Action::SetSegmentEffect(payload) => {
                push_effect_field(batch, payload.segment_id, payload.new_effect);
            }

            Action::SetGroupEffect(_) => {
                let ActionOutcome::Expanded { actions } = outcome else {
                    return Err(StoreError::corrupt(
                        "group effect applied without expansion outcome",
                    ));
                };
                for expanded in actions {
                    self.push_action(batch, state, expanded, &ActionOutcome::None)?;
                }
            }

            Action::SetMicroBrightness(payload) => {
                let key = keys::micro_hash(payload.micro_id);
                push_index(batch, &key);
                batch.push(KvCommand::HashSet {
                    key,
                    fields: vec![("brightness".to_string(), payload.brightness.to_string())],
                });
            }

            Action::ResizeSegmentsFromBoundaries(payload) => {
                let micro = micro_of(state, payload.micro_id)?;
                push_micro_lists(batch, micro);
                for segment_id in &micro.segment_ids {
                    let segment = segment_of(state, *segment_id)?;
                    let key = keys::segment_hash(*segment_id);
                    push_index(batch, &key);
                    batch.push(KvCommand::HashSet {
                        key,
                        fields: vec![
                            ("offset".to_string(), segment.offset.to_string()),
                            ("numLEDs".to_string(), segment.num_leds.to_string()),
                        ],
                    });
                }
            }

            Action::RemoveMicros(payload) => {
                let ActionOutcome::Removed { segment_ids } = outcome else {
                    return Err(StoreError::corrupt("removal applied without removal outcome"));
                };
                for micro_id in &payload.micro_ids {
                    batch.push(KvCommand::SetRemove {
                        key: keys::MICRO_ID_SET.to_string(),
                        member: micro_id.to_string(),
                    });
                    batch.push(KvCommand::Delete {
                        key: keys::micro_hash(*micro_id),
                    });
                    batch.push(KvCommand::Delete {
                        key: keys::micro_segments_list(*micro_id),
                    });
                    batch.push(KvCommand::Delete {
                        key: keys::micro_boundaries_list(*micro_id),
                    });
                }
                for segment_id in segment_ids {
                    batch.push(KvCommand::SetRemove {
                        key: keys::SEGMENT_ID_SET.to_string(),
                        member: segment_id.to_string(),
                    });
                    batch.push(KvCommand::Delete {
                        key: keys::segment_hash(*segment_id),
                    });
                }
            }

            Action::ResetAllState => {
                return self.flush_all();
            }

            // Groups are in-memory only; membership never touches the
            // backend.
            Action::AddSegmentGroup(_)
            | Action::RemoveSegmentGroup(_)
            | Action::AddSegmentToGroup(_)
            | Action::RemoveSegmentFromGroup(_) => {}
        }
        Ok(())
    }
}

impl std::fmt::Debug for PersistenceMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceMapper").finish_non_exhaustive()
    }
}

fn micro_of(state: &EntityState, micro_id: MicroId) -> StoreResult<&Micro> {
    state
        .micros
        .get(&micro_id)
        .ok_or_else(|| StoreError::corrupt(format!("applied state has no micro {micro_id}")))
}

fn segment_of(state: &EntityState, segment_id: SegmentId) -> StoreResult<&Segment> {
    state
        .segments
        .get(&segment_id)
        .ok_or_else(|| StoreError::corrupt(format!("applied state has no segment {segment_id}")))
}

fn push_index(batch: &mut Vec<KvCommand>, key: &str) {
    batch.push(KvCommand::SetAdd {
        key: keys::KEY_INDEX_SET.to_string(),
        member: key.to_string(),
    });
}

fn push_set_add(batch: &mut Vec<KvCommand>, key: &str, member: String) {
    push_index(batch, key);
    batch.push(KvCommand::SetAdd {
        key: key.to_string(),
        member,
    });
}

fn push_micro_lists(batch: &mut Vec<KvCommand>, micro: &Micro) {
    let segments_key = keys::micro_segments_list(micro.micro_id);
    push_index(batch, &segments_key);
    batch.push(KvCommand::ListReplace {
        key: segments_key,
        values: micro.segment_ids.iter().map(ToString::to_string).collect(),
    });

    let boundaries_key = keys::micro_boundaries_list(micro.micro_id);
    push_index(batch, &boundaries_key);
    batch.push(KvCommand::ListReplace {
        key: boundaries_key,
        values: micro
            .segment_boundaries
            .iter()
            .map(ToString::to_string)
            .collect(),
    });
}

fn push_micro_hash(batch: &mut Vec<KvCommand>, micro: &Micro) {
    let key = keys::micro_hash(micro.micro_id);
    push_index(batch, &key);
    batch.push(KvCommand::HashSet {
        key,
        fields: vec![
            ("microId".to_string(), micro.micro_id.to_string()),
            ("totalLEDs".to_string(), micro.total_leds.to_string()),
            ("brightness".to_string(), micro.brightness.to_string()),
        ],
    });
}

fn push_segment_hash(batch: &mut Vec<KvCommand>, segment: &Segment) {
    let key = keys::segment_hash(segment.segment_id);
    push_index(batch, &key);
    batch.push(KvCommand::HashSet {
        key,
        fields: vec![
            ("segmentId".to_string(), segment.segment_id.to_string()),
            ("microId".to_string(), segment.micro_id.to_string()),
            ("offset".to_string(), segment.offset.to_string()),
            ("numLEDs".to_string(), segment.num_leds.to_string()),
            ("effect".to_string(), segment.effect.to_code().to_string()),
            (
                "effectControlledBy".to_string(),
                segment.effect_controlled_by.to_code().to_string(),
            ),
        ],
    });
}

fn push_effect_field(batch: &mut Vec<KvCommand>, segment_id: SegmentId, effect: Effect) {
    let key = keys::segment_hash(segment_id);
    push_index(batch, &key);
    batch.push(KvCommand::HashSet {
        key,
        fields: vec![("effect".to_string(), effect.to_code().to_string())],
    });
}

fn push_collections(batch: &mut Vec<KvCommand>, collections: &MicrosAndSegments) {
    for micro in collections.micros.values() {
        push_set_add(batch, keys::MICRO_ID_SET, micro.micro_id.to_string());
        push_micro_hash(batch, micro);
        push_micro_lists(batch, micro);
    }
    for segment in collections.segments.values() {
        push_set_add(batch, keys::SEGMENT_ID_SET, segment.segment_id.to_string());
        push_segment_hash(batch, segment);
    }
}

fn expect_members(reply: &KvReply) -> StoreResult<&[String]> {
    match reply {
        KvReply::Members(members) => Ok(members),
        other => Err(StoreError::WrongReply {
            expected: "members",
            got: other.shape(),
        }),
    }
}

fn expect_hash(reply: &KvReply) -> StoreResult<&[(String, String)]> {
    match reply {
        KvReply::Hash(fields) => Ok(fields),
        other => Err(StoreError::WrongReply {
            expected: "hash",
            got: other.shape(),
        }),
    }
}

fn expect_list(reply: &KvReply) -> StoreResult<&[String]> {
    match reply {
        KvReply::List(values) => Ok(values),
        other => Err(StoreError::WrongReply {
            expected: "list",
            got: other.shape(),
        }),
    }
}

fn parse_id_set<T: From<i64>>(members: &[String], what: &str) -> StoreResult<Vec<T>> {
    members
        .iter()
        .map(|member| {
            member
                .parse::<i64>()
                .map(T::from)
                .map_err(|_| StoreError::bad_field(what, member.clone()))
        })
        .collect()
}

fn field<'a>(fields: &'a [(String, String)], name: &str) -> StoreResult<&'a str> {
    fields
        .iter()
        .find(|(field, _)| field == name)
        .map(|(_, value)| value.as_str())
        .ok_or_else(|| StoreError::corrupt(format!("missing hash field {name}")))
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> StoreResult<T> {
    value
        .parse::<T>()
        .map_err(|_| StoreError::bad_field(name, value))
}

fn parse_micro(
    micro_id: MicroId,
    fields: &[(String, String)],
    segment_list: &[String],
    boundary_list: &[String],
) -> StoreResult<Micro> {
    if fields.is_empty() {
        return Err(StoreError::corrupt(format!(
            "micro {micro_id} is in the id set but has no hash"
        )));
    }
    let segment_ids = segment_list
        .iter()
        .map(|value| parse_number::<i64>("segmentIds", value).map(SegmentId::new))
        .collect::<StoreResult<Vec<_>>>()?;
    let segment_boundaries = boundary_list
        .iter()
        .map(|value| parse_number::<u32>("segmentBoundaries", value))
        .collect::<StoreResult<Vec<_>>>()?;

    Ok(Micro {
        micro_id: MicroId::new(parse_number("microId", field(fields, "microId")?)?),
        total_leds: parse_number("totalLEDs", field(fields, "totalLEDs")?)?,
        brightness: parse_number("brightness", field(fields, "brightness")?)?,
        segment_ids,
        segment_boundaries,
    })
}

fn parse_segment(segment_id: SegmentId, fields: &[(String, String)]) -> StoreResult<Segment> {
    if fields.is_empty() {
        return Err(StoreError::corrupt(format!(
            "segment {segment_id} is in the id set but has no hash"
        )));
    }
    let effect_code: u8 = parse_number("effect", field(fields, "effect")?)?;
    let effect = Effect::from_code(effect_code)
        .ok_or_else(|| StoreError::bad_field("effect", effect_code.to_string()))?;

    Ok(Segment {
        segment_id: SegmentId::new(parse_number("segmentId", field(fields, "segmentId")?)?),
        micro_id: MicroId::new(parse_number("microId", field(fields, "microId")?)?),
        offset: parse_number("offset", field(fields, "offset")?)?,
        num_leds: parse_number("numLEDs", field(fields, "numLEDs")?)?,
        effect,
        effect_controlled_by: EffectControl::from_code(parse_number(
            "effectControlledBy",
            field(fields, "effectControlledBy")?,
        )?),
    })
}
