//! Object storage for merged videos.
//!
//! This crate provides:
//! - The [`StorageSink`] upload capability
//! - A Cloudflare R2 implementation
//! - An in-memory sink for tests

pub mod client;
pub mod error;
pub mod sink;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use sink::{public_url, validate_key, MemorySink, StorageSink, StoredObject};
