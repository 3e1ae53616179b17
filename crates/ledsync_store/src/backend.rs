//! Key-value backend trait definition.

use crate::error::StoreResult;

/// One write in a batch.
///
/// The command vocabulary is exactly what the persistence mapping needs:
/// membership edits on id sets, whole-hash writes, whole-list replacement,
/// and key deletion. Backends stay dumb; the mapper owns all meaning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvCommand {
    /// Adds a member to an unordered string set.
    SetAdd {
        /// The set key.
        key: String,
        /// The member to add.
        member: String,
    },
    /// Removes a member from an unordered string set.
    SetRemove {
        /// The set key.
        key: String,
        /// The member to remove.
        member: String,
    },
    /// Writes fields into a hash, creating it if absent.
    HashSet {
        /// The hash key.
        key: String,
        /// Field/value pairs to write.
        fields: Vec<(String, String)>,
    },
    /// Replaces an ordered list with exactly these values.
    ///
    /// Backends must ensure a shrinking list leaves no stale tail entries
    /// (push everything, then trim to the new length).
    ListReplace {
        /// The list key.
        key: String,
        /// The new contents, in order.
        values: Vec<String>,
    },
    /// Deletes a key of any shape.
    Delete {
        /// The key to delete.
        key: String,
    },
}

/// One read in a pipelined query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvRead {
    /// Reads every member of a set.
    SetMembers {
        /// The set key.
        key: String,
    },
    /// Reads every field of a hash.
    HashGetAll {
        /// The hash key.
        key: String,
    },
    /// Reads a whole list in order.
    ListRange {
        /// The list key.
        key: String,
    },
}

/// One reply, positionally matching the read that produced it.
///
/// A missing key reads as the empty collection of its shape, as Redis
/// reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvReply {
    /// Members of a set, unordered.
    Members(Vec<String>),
    /// Field/value pairs of a hash.
    Hash(Vec<(String, String)>),
    /// List contents, in order.
    List(Vec<String>),
}

/// A key-value backend for the persistence mapper.
///
/// # Invariants
///
/// - `execute` applies the whole batch with all-or-nothing intent: as much
///   atomicity as the backend's batch primitive provides, and never an
///   interleaving with another caller's batch.
/// - `query` returns exactly one reply per read, in read order.
/// - Backends must be `Send + Sync`; the mapper is shared across tasks.
///
/// # Implementors
///
/// - [`super::MemoryBackend`] - for tests and ephemeral use
/// - [`super::RedisBackend`] - the shared production backend
pub trait KvBackend: Send + Sync {
    /// Applies a batch of writes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Unavailable`] if the backend cannot be
    /// reached or the batch is not acknowledged in time.
    fn execute(&self, batch: &[KvCommand]) -> StoreResult<()>;

    /// Issues a batch of reads as one pipelined round trip.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Unavailable`] on connection failure or
    /// timeout; reply-shape mismatches surface as
    /// [`crate::StoreError::WrongReply`].
    fn query(&self, reads: &[KvRead]) -> StoreResult<Vec<KvReply>>;

    /// Drops every key in the backend.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::Unavailable`] if the flush is not
    /// acknowledged.
    fn flush_all(&self) -> StoreResult<()>;
}

impl<T: KvBackend + ?Sized> KvBackend for std::sync::Arc<T> {
    fn execute(&self, batch: &[KvCommand]) -> StoreResult<()> {
        (**self).execute(batch)
    }

    fn query(&self, reads: &[KvRead]) -> StoreResult<Vec<KvReply>> {
        (**self).query(reads)
    }

    fn flush_all(&self) -> StoreResult<()> {
        (**self).flush_all()
    }
}

impl KvReply {
    /// A short name for error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            KvReply::Members(_) => "members",
            KvReply::Hash(_) => "hash",
            KvReply::List(_) => "list",
        }
    }
}
