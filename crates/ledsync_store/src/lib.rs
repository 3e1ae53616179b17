//! # ledsync store
//!
//! Persistence for the ledsync entity model: a small key-value backend
//! abstraction ([`KvBackend`]) with Redis and in-memory implementations, and
//! the [`PersistenceMapper`] that turns applied actions into write batches
//! and reconstructs the full collections on startup.
//!
//! The mapper is fail-closed: a write that is not acknowledged is an error
//! the caller must treat as "do not publish", and a read that finds a
//! half-present record fails whole rather than returning a partial model.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod error;
pub mod keys;
pub mod mapper;
pub mod memory;
pub mod redis;

pub use backend::{KvBackend, KvCommand, KvRead, KvReply};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use mapper::PersistenceMapper;
pub use memory::MemoryBackend;
pub use redis::RedisBackend;
