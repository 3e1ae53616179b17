//! Redis-backed key-value backend.

use redis::{Client, Connection, FromRedisValue, Value};
use tracing::debug;

use crate::backend::{KvBackend, KvCommand, KvRead, KvReply};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// The shared production backend.
///
/// Write batches go through `MULTI`/`EXEC` (an atomic pipeline); reads go
/// through a plain pipeline. List replacement pushes all values and trims
/// to the new length, so a shrinking list never leaves stale tail entries.
pub struct RedisBackend {
    client: Client,
    config: StoreConfig,
}

impl RedisBackend {
    /// Creates a backend for the configured URL.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL does not parse.
    pub fn open(config: StoreConfig) -> StoreResult<Self> {
        let client = Client::open(config.url.as_str())?;
        Ok(Self { client, config })
    }

    fn connection(&self) -> StoreResult<Connection> {
        let connection = self
            .client
            .get_connection_with_timeout(self.config.connect_timeout)?;
        connection.set_read_timeout(Some(self.config.read_timeout))?;
        connection.set_write_timeout(Some(self.config.write_timeout))?;
        Ok(connection)
    }
}

impl KvBackend for RedisBackend {
    fn execute(&self, batch: &[KvCommand]) -> StoreResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let mut connection = self.connection()?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for command in batch {
            match command {
                KvCommand::SetAdd { key, member } => {
                    pipe.sadd(key, member).ignore();
                }
                KvCommand::SetRemove { key, member } => {
                    pipe.srem(key, member).ignore();
                }
                KvCommand::HashSet { key, fields } => {
                    pipe.hset_multiple(key, fields).ignore();
                }
                KvCommand::ListReplace { key, values } => {
                    if values.is_empty() {
                        pipe.del(key).ignore();
                    } else {
                        let reversed: Vec<&String> = values.iter().rev().collect();
                        pipe.lpush(key, reversed).ignore();
                        pipe.ltrim(key, 0, values.len() as isize - 1).ignore();
                    }
                }
                KvCommand::Delete { key } => {
                    pipe.del(key).ignore();
                }
            }
        }
        debug!(commands = batch.len(), "executing write batch");
        pipe.query::<()>(&mut connection)?;
        Ok(())
    }

    fn query(&self, reads: &[KvRead]) -> StoreResult<Vec<KvReply>> {
        if reads.is_empty() {
            return Ok(Vec::new());
        }
        let mut connection = self.connection()?;
        let mut pipe = redis::pipe();
        for read in reads {
            match read {
                KvRead::SetMembers { key } => {
                    pipe.smembers(key);
                }
                KvRead::HashGetAll { key } => {
                    pipe.hgetall(key);
                }
                KvRead::ListRange { key } => {
                    pipe.lrange(key, 0, -1);
                }
            }
        }
        let raw: Vec<Value> = pipe.query(&mut connection)?;
        if raw.len() != reads.len() {
            return Err(StoreError::corrupt(format!(
                "pipeline returned {} replies for {} reads",
                raw.len(),
                reads.len()
            )));
        }

        reads
            .iter()
            .zip(raw)
            .map(|(read, value)| match read {
                KvRead::SetMembers { .. } => {
                    Vec::<String>::from_redis_value(&value).map(KvReply::Members)
                }
                KvRead::HashGetAll { .. } => {
                    Vec::<(String, String)>::from_redis_value(&value).map(KvReply::Hash)
                }
                KvRead::ListRange { .. } => {
                    Vec::<String>::from_redis_value(&value).map(KvReply::List)
                }
            })
            .map(|reply| reply.map_err(StoreError::from))
            .collect()
    }

    fn flush_all(&self) -> StoreResult<()> {
        let mut connection = self.connection()?;
        redis::cmd("FLUSHALL").query::<()>(&mut connection)?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBackend")
            .field("url", &self.config.url)
            .finish_non_exhaustive()
    }
}
