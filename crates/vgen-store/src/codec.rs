//! Record encoding: gzip-compressed JSON.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// Serialize a record to compressed bytes.
pub fn encode<T: Serialize>(record: &T) -> StoreResult<Vec<u8>> {
    let json = serde_json::to_vec(record)?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .map_err(|e| StoreError::Serialization(format!("Failed to gzip record: {}", e)))?;

    encoder
        .finish()
        .map_err(|e| StoreError::Serialization(format!("Failed to finish gzip encoding: {}", e)))
}

/// Deserialize a record from compressed bytes read at `key`.
pub fn decode<T: DeserializeOwned>(key: &str, data: &[u8]) -> StoreResult<T> {
    let mut decoder = GzDecoder::new(data);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .map_err(|e| StoreError::corrupt(key, format!("gzip: {}", e)))?;

    serde_json::from_slice(&json).map_err(|e| StoreError::corrupt(key, format!("json: {}", e)))
}
