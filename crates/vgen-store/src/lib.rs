//! Expiring job record store.
//!
//! This crate provides:
//! - A byte-oriented expiring key-value abstraction (Redis and in-memory)
//! - The job key schema (pending / error / primary)
//! - Compact gzip-JSON record encoding with a mandatory TTL

pub mod codec;
pub mod error;
pub mod keys;
pub mod kv;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use keys::{JobKeys, DEFAULT_KEY_PREFIX};
pub use kv::{KvStore, MemoryStore, RedisStore};
pub use store::{JobStore, StoreConfig, JOB_TTL_SECS};
