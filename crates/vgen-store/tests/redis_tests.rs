//! Redis-backed store integration tests.

use std::time::Duration;

use chrono::Utc;
use vgen_models::{ErrorRecord, Job, JobId, JobRequest, OperationHandle, PendingRecord};
use vgen_store::{JobStore, KvStore, RedisStore, StoreConfig};

fn redis_url() -> String {
    dotenvy::dotenv().ok();
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// Test Redis connection and basic operations.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_ping() {
    let store = RedisStore::new(&redis_url()).expect("Failed to create store");
    store.ping().await.expect("Failed to ping Redis");
}

/// Test that records expire on the server side.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_ttl_expiry() {
    let store = RedisStore::new(&redis_url()).expect("Failed to create store");
    let key = format!("vgen-test:{}", JobId::new());

    store
        .put(&key, b"short-lived".to_vec(), Duration::from_secs(1))
        .await
        .expect("Failed to put");
    assert!(store.get(&key).await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(store.get(&key).await.unwrap().is_none());
}

/// Test the full record lifecycle against Redis.
#[tokio::test]
#[ignore = "requires Redis"]
async fn test_redis_job_lifecycle() {
    let config = StoreConfig {
        redis_url: redis_url(),
        key_prefix: "vgen-test".to_string(),
        ..StoreConfig::default()
    };
    let store = JobStore::redis(&config).expect("Failed to create store");
    let id = JobId::new();

    store
        .put_pending(&id, &PendingRecord::new(Utc::now()))
        .await
        .unwrap();
    assert!(store.get_pending(&id).await.unwrap().is_some());

    let job = Job::new(
        id.clone(),
        OperationHandle::new("operations/test"),
        JobRequest::new(vec![1], "prompt", "context").summary(),
        Utc::now(),
    );
    store.put_job(&job).await.unwrap();
    store.delete_pending(&id).await.unwrap();

    assert!(store.get_pending(&id).await.unwrap().is_none());
    assert_eq!(store.get_job(&id).await.unwrap(), Some(job));

    store
        .put_error(&id, &ErrorRecord::new("test", Utc::now()))
        .await
        .unwrap();
    assert_eq!(
        store.get_error(&id).await.unwrap().map(|e| e.message),
        Some("test".to_string())
    );

    store.delete_job(&id).await.unwrap();
}
