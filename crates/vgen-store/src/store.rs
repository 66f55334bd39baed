//! Typed access to job records.

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use vgen_models::{ErrorRecord, Job, JobId, PendingRecord};

use crate::codec::{decode, encode};
use crate::error::StoreResult;
use crate::keys::{JobKeys, DEFAULT_KEY_PREFIX};
use crate::kv::{KvStore, MemoryStore, RedisStore};

/// TTL applied to every job record.
pub const JOB_TTL_SECS: u64 = 300;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Redis URL
    pub redis_url: String,
    /// Expiry applied to every record
    pub ttl: Duration,
    /// Key namespace
    pub key_prefix: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            ttl: Duration::from_secs(JOB_TTL_SECS),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl StoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            ttl: Duration::from_secs(
                std::env::var("JOB_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(JOB_TTL_SECS),
            ),
            key_prefix: std::env::var("JOB_KEY_PREFIX")
                .unwrap_or_else(|_| DEFAULT_KEY_PREFIX.to_string()),
        }
    }
}

/// Job record store: key schema, codec and TTL policy over a [`KvStore`].
#[derive(Clone)]
pub struct JobStore {
    kv: Arc<dyn KvStore>,
    keys: JobKeys,
    ttl: Duration,
}

impl JobStore {
    pub fn new(kv: Arc<dyn KvStore>, keys: JobKeys, ttl: Duration) -> Self {
        Self { kv, keys, ttl }
    }

    /// Redis-backed store from configuration.
    pub fn redis(config: &StoreConfig) -> StoreResult<Self> {
        let kv = RedisStore::new(&config.redis_url)?;
        Ok(Self::new(
            Arc::new(kv),
            JobKeys::new(config.key_prefix.clone()),
            config.ttl,
        ))
    }

    /// Create from environment variables.
    pub fn from_env() -> StoreResult<Self> {
        Self::redis(&StoreConfig::from_env())
    }

    /// In-memory store with default keys and TTL.
    pub fn in_memory(kv: Arc<MemoryStore>) -> Self {
        Self::new(kv, JobKeys::default(), Duration::from_secs(JOB_TTL_SECS))
    }

    pub fn keys(&self) -> &JobKeys {
        &self.keys
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Health check for the underlying store.
    pub async fn ping(&self) -> StoreResult<()> {
        self.kv.ping().await
    }

    pub async fn put_pending(&self, job_id: &JobId, record: &PendingRecord) -> StoreResult<()> {
        self.put(&self.keys.pending(job_id), record).await
    }

    pub async fn get_pending(&self, job_id: &JobId) -> StoreResult<Option<PendingRecord>> {
        self.get(&self.keys.pending(job_id)).await
    }

    pub async fn delete_pending(&self, job_id: &JobId) -> StoreResult<()> {
        self.kv.delete(&self.keys.pending(job_id)).await
    }

    pub async fn put_error(&self, job_id: &JobId, record: &ErrorRecord) -> StoreResult<()> {
        self.put(&self.keys.error(job_id), record).await
    }

    pub async fn get_error(&self, job_id: &JobId) -> StoreResult<Option<ErrorRecord>> {
        self.get(&self.keys.error(job_id)).await
    }

    pub async fn put_job(&self, job: &Job) -> StoreResult<()> {
        self.put(&self.keys.primary(&job.id), job).await
    }

    pub async fn get_job(&self, job_id: &JobId) -> StoreResult<Option<Job>> {
        self.get(&self.keys.primary(job_id)).await
    }

    pub async fn delete_job(&self, job_id: &JobId) -> StoreResult<()> {
        self.kv.delete(&self.keys.primary(job_id)).await
    }

    async fn put<T: Serialize>(&self, key: &str, record: &T) -> StoreResult<()> {
        let bytes = encode(record)?;
        debug!(key = %key, size = bytes.len(), "Writing job record");
        self.kv.put(key, bytes, self.ttl).await
    }

    async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        match self.kv.get(key).await? {
            Some(bytes) => decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vgen_models::{JobRequest, OperationHandle};

    fn store() -> (Arc<MemoryStore>, JobStore) {
        let kv = Arc::new(MemoryStore::new());
        (Arc::clone(&kv), JobStore::in_memory(kv))
    }

    #[tokio::test]
    async fn test_records_use_separate_keys() {
        let (kv, store) = store();
        let id = JobId::from_string("j1");

        store
            .put_pending(&id, &PendingRecord::new(Utc::now()))
            .await
            .unwrap();
        store
            .put_error(&id, &ErrorRecord::new("boom", Utc::now()))
            .await
            .unwrap();

        assert!(kv.contains("job:j1:pending").await);
        assert!(kv.contains("job:j1:error").await);
        assert!(!kv.contains("job:j1").await);
    }

    #[tokio::test]
    async fn test_job_roundtrip_through_store() {
        let (_, store) = store();
        let job = Job::new(
            JobId::new(),
            OperationHandle::new("operations/7"),
            JobRequest::new(vec![1], "prompt", "context").summary(),
            Utc::now(),
        );

        store.put_job(&job).await.unwrap();
        assert_eq!(store.get_job(&job.id).await.unwrap(), Some(job.clone()));

        store.delete_job(&job.id).await.unwrap();
        assert_eq!(store.get_job(&job.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_records_are_none() {
        let (_, store) = store();
        let id = JobId::new();
        assert!(store.get_pending(&id).await.unwrap().is_none());
        assert!(store.get_error(&id).await.unwrap().is_none());
        assert!(store.get_job(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_value_is_reported() {
        let (kv, store) = store();
        let id = JobId::from_string("bad");
        kv.put("job:bad", b"garbage".to_vec(), Duration::from_secs(10))
            .await
            .unwrap();

        assert!(store.get_job(&id).await.is_err());
    }

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.key_prefix, "job");
    }
}
