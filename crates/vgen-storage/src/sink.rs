//! The upload capability used by the merge pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{StorageError, StorageResult};

/// Accepts bytes under a path and returns a publicly resolvable URL.
#[async_trait]
pub trait StorageSink: Send + Sync {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str)
        -> StorageResult<String>;

    /// Verify the backing store is reachable.
    async fn check_connectivity(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Reject keys that would escape their prefix or address the bucket root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty()
        || key.starts_with('/')
        || key.split('/').any(|segment| segment.is_empty() || segment == "..")
    {
        return Err(StorageError::invalid_key(key));
    }
    Ok(())
}

/// Join a public base URL and an object key.
pub fn public_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

/// A stored object held by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory sink for tests and local runs.
pub struct MemorySink {
    base_url: String,
    objects: Mutex<HashMap<String, StoredObject>>,
    offline: AtomicBool,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new("https://storage.local")
    }
}

impl MemorySink {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            objects: Mutex::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Make every call fail as if the backing store were down.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unreachable("memory sink offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageSink for MemorySink {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String> {
        self.ensure_online()?;
        validate_key(path)?;

        self.objects.lock().await.insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(public_url(&self.base_url, path))
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        self.ensure_online()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("videos/user-1/merged_abc.mp4").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/videos/a.mp4").is_err());
        assert!(validate_key("videos/../secrets").is_err());
        assert!(validate_key("videos//a.mp4").is_err());
    }

    #[test]
    fn test_public_url_trims_slash() {
        assert_eq!(
            public_url("https://cdn.example.com/", "videos/a.mp4"),
            "https://cdn.example.com/videos/a.mp4"
        );
    }

    #[tokio::test]
    async fn test_memory_sink_upload() {
        let sink = MemorySink::default();
        let url = sink
            .upload("videos/u/merged_1.mp4", vec![1, 2, 3], "video/mp4")
            .await
            .unwrap();

        assert_eq!(url, "https://storage.local/videos/u/merged_1.mp4");
        let object = sink.get("videos/u/merged_1.mp4").await.unwrap();
        assert_eq!(object.bytes, vec![1, 2, 3]);
        assert_eq!(object.content_type, "video/mp4");
    }

    #[tokio::test]
    async fn test_memory_sink_offline() {
        let sink = MemorySink::default();
        sink.set_offline(true);
        assert!(sink.check_connectivity().await.is_err());
        assert!(sink.upload("a/b", vec![], "video/mp4").await.is_err());
        assert!(sink.keys().await.is_empty());
    }
}
