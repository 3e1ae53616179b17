//! In-memory key-value backend for testing.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::backend::{KvBackend, KvCommand, KvRead, KvReply};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct Inner {
    sets: HashMap<String, HashSet<String>>,
    hashes: HashMap<String, HashMap<String, String>>,
    lists: HashMap<String, Vec<String>>,
}

/// An in-memory key-value backend.
///
/// Holds all three record shapes under one lock, so a batch applies
/// atomically with respect to concurrent queries. Suitable for unit and
/// integration tests and for ephemeral single-process use.
///
/// `set_offline` makes every operation fail with
/// [`StoreError::Unavailable`], for exercising fail-closed paths.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    inner: RwLock<Inner>,
    offline: RwLock<bool>,
}

impl MemoryBackend {
    /// Creates a new empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the backend becoming unreachable.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.write() = offline;
    }

    /// Returns every key currently present, across all shapes.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.read();
        inner
            .sets
            .keys()
            .chain(inner.hashes.keys())
            .chain(inner.lists.keys())
            .cloned()
            .collect()
    }

    fn check_online(&self) -> StoreResult<()> {
        if *self.offline.read() {
            return Err(StoreError::unavailable("memory backend is offline"));
        }
        Ok(())
    }
}

impl KvBackend for MemoryBackend {
    fn execute(&self, batch: &[KvCommand]) -> StoreResult<()> {
        self.check_online()?;
        let mut inner = self.inner.write();
        for command in batch {
            match command {
                KvCommand::SetAdd { key, member } => {
                    inner.sets.entry(key.clone()).or_default().insert(member.clone());
                }
                KvCommand::SetRemove { key, member } => {
                    if let Some(set) = inner.sets.get_mut(key) {
                        set.remove(member);
                    }
                }
                KvCommand::HashSet { key, fields } => {
                    let hash = inner.hashes.entry(key.clone()).or_default();
                    for (field, value) in fields {
                        hash.insert(field.clone(), value.clone());
                    }
                }
                KvCommand::ListReplace { key, values } => {
                    inner.lists.insert(key.clone(), values.clone());
                }
                KvCommand::Delete { key } => {
                    inner.sets.remove(key);
                    inner.hashes.remove(key);
                    inner.lists.remove(key);
                }
            }
        }
        Ok(())
    }

    fn query(&self, reads: &[KvRead]) -> StoreResult<Vec<KvReply>> {
        self.check_online()?;
        let inner = self.inner.read();
        let replies = reads
            .iter()
            .map(|read| match read {
                KvRead::SetMembers { key } => KvReply::Members(
                    inner
                        .sets
                        .get(key)
                        .map(|set| set.iter().cloned().collect())
                        .unwrap_or_default(),
                ),
                KvRead::HashGetAll { key } => KvReply::Hash(
                    inner
                        .hashes
                        .get(key)
                        .map(|hash| {
                            hash.iter()
                                .map(|(field, value)| (field.clone(), value.clone()))
                                .collect()
                        })
                        .unwrap_or_default(),
                ),
                KvRead::ListRange { key } => {
                    KvReply::List(inner.lists.get(key).cloned().unwrap_or_default())
                }
            })
            .collect();
        Ok(replies)
    }

    fn flush_all(&self) -> StoreResult<()> {
        self.check_online()?;
        *self.inner.write() = Inner::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_add(key: &str, member: &str) -> KvCommand {
        KvCommand::SetAdd {
            key: key.to_string(),
            member: member.to_string(),
        }
    }

    #[test]
    fn set_membership_roundtrip() {
        let backend = MemoryBackend::new();
        backend
            .execute(&[set_add("ids", "1"), set_add("ids", "2"), set_add("ids", "1")])
            .unwrap();

        let replies = backend
            .query(&[KvRead::SetMembers {
                key: "ids".to_string(),
            }])
            .unwrap();
        match &replies[0] {
            KvReply::Members(members) => {
                let mut members = members.clone();
                members.sort();
                assert_eq!(members, vec!["1", "2"]);
            }
            other => panic!("expected members, got {other:?}"),
        }

        backend
            .execute(&[KvCommand::SetRemove {
                key: "ids".to_string(),
                member: "1".to_string(),
            }])
            .unwrap();
        let replies = backend
            .query(&[KvRead::SetMembers {
                key: "ids".to_string(),
            }])
            .unwrap();
        assert_eq!(replies[0], KvReply::Members(vec!["2".to_string()]));
    }

    #[test]
    fn list_replace_leaves_no_stale_tail() {
        let backend = MemoryBackend::new();
        backend
            .execute(&[KvCommand::ListReplace {
                key: "order".to_string(),
                values: vec!["10".to_string(), "11".to_string(), "12".to_string()],
            }])
            .unwrap();
        backend
            .execute(&[KvCommand::ListReplace {
                key: "order".to_string(),
                values: vec!["10".to_string()],
            }])
            .unwrap();

        let replies = backend
            .query(&[KvRead::ListRange {
                key: "order".to_string(),
            }])
            .unwrap();
        assert_eq!(replies[0], KvReply::List(vec!["10".to_string()]));
    }

    #[test]
    fn hash_set_merges_fields() {
        let backend = MemoryBackend::new();
        backend
            .execute(&[KvCommand::HashSet {
                key: "h".to_string(),
                fields: vec![
                    ("brightness".to_string(), "255".to_string()),
                    ("totalLEDs".to_string(), "100".to_string()),
                ],
            }])
            .unwrap();
        backend
            .execute(&[KvCommand::HashSet {
                key: "h".to_string(),
                fields: vec![("brightness".to_string(), "10".to_string())],
            }])
            .unwrap();

        let replies = backend
            .query(&[KvRead::HashGetAll {
                key: "h".to_string(),
            }])
            .unwrap();
        match &replies[0] {
            KvReply::Hash(fields) => {
                let mut fields = fields.clone();
                fields.sort();
                assert_eq!(
                    fields,
                    vec![
                        ("brightness".to_string(), "10".to_string()),
                        ("totalLEDs".to_string(), "100".to_string()),
                    ]
                );
            }
            other => panic!("expected hash, got {other:?}"),
        }
    }

    #[test]
    fn missing_keys_read_as_empty() {
        let backend = MemoryBackend::new();
        let replies = backend
            .query(&[
                KvRead::SetMembers {
                    key: "nope".to_string(),
                },
                KvRead::HashGetAll {
                    key: "nope".to_string(),
                },
                KvRead::ListRange {
                    key: "nope".to_string(),
                },
            ])
            .unwrap();
        assert_eq!(replies[0], KvReply::Members(vec![]));
        assert_eq!(replies[1], KvReply::Hash(vec![]));
        assert_eq!(replies[2], KvReply::List(vec![]));
    }

    #[test]
    fn delete_drops_any_shape() {
        let backend = MemoryBackend::new();
        backend
            .execute(&[
                set_add("s", "x"),
                KvCommand::ListReplace {
                    key: "l".to_string(),
                    values: vec!["1".to_string()],
                },
            ])
            .unwrap();
        backend
            .execute(&[
                KvCommand::Delete {
                    key: "s".to_string(),
                },
                KvCommand::Delete {
                    key: "l".to_string(),
                },
            ])
            .unwrap();
        assert!(backend.keys().is_empty());
    }

    #[test]
    fn flush_all_empties_the_backend() {
        let backend = MemoryBackend::new();
        backend.execute(&[set_add("s", "x")]).unwrap();
        backend.flush_all().unwrap();
        assert!(backend.keys().is_empty());
    }

    #[test]
    fn offline_backend_fails_everything() {
        let backend = MemoryBackend::new();
        backend.execute(&[set_add("s", "x")]).unwrap();
        backend.set_offline(true);

        assert!(matches!(
            backend.execute(&[set_add("s", "y")]),
            Err(StoreError::Unavailable { .. })
        ));
        assert!(matches!(
            backend.query(&[KvRead::SetMembers {
                key: "s".to_string()
            }]),
            Err(StoreError::Unavailable { .. })
        ));

        backend.set_offline(false);
        assert!(backend.query(&[]).is_ok());
    }
}
