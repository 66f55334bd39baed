//! HTTP router tests against the in-memory store, stub backend and memory sink.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::{json, Value};
use tower::ServiceExt;

use vgen_api::{create_router, ApiConfig, AppState};
use vgen_genai::{StubBackend, StubCall, StubStep};
use vgen_media::{MergeConfig, MuxerCommand};
use vgen_storage::MemorySink;
use vgen_store::{JobKeys, JobStore, KvStore, MemoryStore, StoreResult, JOB_TTL_SECS};

const BOUNDARY: &str = "vgen-test-boundary";

/// Delays every read so requests outlive the API timeout.
struct SlowStore {
    inner: Arc<MemoryStore>,
    delay: Duration,
}

#[async_trait::async_trait]
impl KvStore for SlowStore {
    async fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        self.inner.put(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        tokio::time::sleep(self.delay).await;
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.inner.delete(key).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

/// Multipart body with a single file field.
fn multipart_body(field: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"clip.mp4\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

struct TestApp {
    router: Router,
    backend: Arc<StubBackend>,
    kv: Arc<MemoryStore>,
    sink: Arc<MemorySink>,
}

impl TestApp {
    fn new(backend: StubBackend) -> Self {
        let kv = Arc::new(MemoryStore::new());
        let store = JobStore::in_memory(kv.clone());
        Self::build(backend, ApiConfig::default(), store, kv)
    }

    /// Reads take `delay`; requests time out after `timeout`.
    fn slow(delay: Duration, timeout: Duration) -> Self {
        let kv = Arc::new(MemoryStore::new());
        let slow = SlowStore {
            inner: kv.clone(),
            delay,
        };
        let store = JobStore::new(
            Arc::new(slow),
            JobKeys::default(),
            Duration::from_secs(JOB_TTL_SECS),
        );
        let config = ApiConfig {
            request_timeout: timeout,
            ..ApiConfig::default()
        };
        Self::build(StubBackend::new(), config, store, kv)
    }

    fn build(
        backend: StubBackend,
        config: ApiConfig,
        store: JobStore,
        kv: Arc<MemoryStore>,
    ) -> Self {
        let backend = Arc::new(backend);
        let sink = Arc::new(MemorySink::default());

        let state = AppState::from_parts(
            config,
            store,
            backend.clone(),
            sink.clone(),
            MergeConfig {
                muxer: MuxerCommand::new("sh").args(["-c", "cat"]),
                timeout: Some(Duration::from_secs(30)),
            },
        );

        Self {
            router: create_router(state, None),
            backend,
            kv,
            sink,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, body: Value, user: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header("x-user-id", user);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn upload(&self, body: Vec<u8>) -> (StatusCode, Value) {
        let request = Request::post("/api/gemini/extract-context")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn submit(&self) -> String {
        let (status, body) = self
            .post(
                "/api/video",
                json!({
                    "startingImage": STANDARD.encode(b"\x89PNG frame"),
                    "prompt": "waves crash",
                    "context": "stormy coast",
                }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["jobId"].as_str().unwrap().to_string()
    }

    /// Poll until the job leaves `waiting`.
    async fn poll_until_terminal(&self, job_id: &str) -> Value {
        for _ in 0..200 {
            let (status, body) = self.get(&format!("/api/video/{}", job_id)).await;
            assert_eq!(status, StatusCode::OK, "{}", body);
            if body["status"] != "waiting" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} never finished", job_id);
    }
}

#[tokio::test]
async fn test_submit_then_poll_to_done_once() {
    let app = TestApp::new(StubBackend::new().with_annotations("Arrow: pan left."));
    app.backend.hold();

    let job_id = app.submit().await;
    let (status, body) = app.get(&format!("/api/video/{}", job_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "waiting");
    assert!(body["jobStartTime"].is_string());
    assert!(body.get("jobEndTime").is_none());

    app.backend.release();
    let body = app.poll_until_terminal(&job_id).await;
    assert_eq!(body["status"], "done");
    assert!(body["videoURL"]
        .as_str()
        .unwrap()
        .starts_with("https://storage.googleapis.com/stub-bucket/videos/"));
    assert!(body["jobEndTime"].is_string());
    assert_eq!(body["metadata"]["annotations"], "Arrow: pan left.");

    let (status, body) = app.get(&format!("/api/video/{}", job_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_failed_job_reports_error() {
    let app = TestApp::new(StubBackend::new().failing_at(StubStep::GenerateVideo));
    let job_id = app.submit().await;

    let body = app.poll_until_terminal(&job_id).await;
    assert_eq!(body["status"], "error");
    assert!(body["error"].as_str().unwrap().contains("stub backend failed"));
    assert!(body.get("videoURL").is_none());
}

#[tokio::test]
async fn test_submit_rejects_bad_input() {
    let app = TestApp::new(StubBackend::new());

    let (status, body) = app
        .post("/api/video", json!({"startingImage": "%%%", "prompt": "p"}), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("startingImage"));

    let (status, _) = app
        .post(
            "/api/video",
            json!({"startingImage": STANDARD.encode(b"img"), "durationSeconds": 30}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/api/video", json!({"prompt": "p"}), None).await;
    assert!(status.is_client_error());

    assert!(app.kv.is_empty().await);
    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_and_malformed_job_ids_are_not_found() {
    let app = TestApp::new(StubBackend::new());

    let (status, _) = app
        .get("/api/video/550e8400-e29b-41d4-a716-446655440000")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get("/api/video/abc:pending").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_store_outage_is_service_unavailable() {
    let app = TestApp::new(StubBackend::new());
    let job_id = app.submit().await;

    app.kv.set_offline(true);
    let (status, _) = app.get(&format!("/api/video/{}", job_id)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = app.get("/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["store"]["status"], "error");
    assert_eq!(body["checks"]["storage"]["status"], "ok");
}

#[tokio::test]
async fn test_merge_uploads_under_owner_prefix() {
    let app = TestApp::new(StubBackend::new());

    let (status, body) = app
        .post(
            "/api/video/merge",
            json!({"videoUrls": ["https://cdn.example.com/a.mp4", "https://cdn.example.com/b.mp4"]}),
            Some("user-7"),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let url = body["videoUrl"].as_str().unwrap();
    assert!(url.starts_with("https://storage.local/videos/user-7/merged_"));

    let keys = app.sink.keys().await;
    assert_eq!(keys.len(), 1);
    assert_eq!(url, format!("https://storage.local/{}", keys[0]));
}

#[tokio::test]
async fn test_merge_validates_request() {
    let app = TestApp::new(StubBackend::new());

    let (status, _) = app
        .post(
            "/api/video/merge",
            json!({"videoUrls": ["https://cdn.example.com/a.mp4"]}),
            Some("user-7"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/video/merge",
            json!({"videoUrls": ["https://cdn.example.com/a.mp4", "https://cdn.example.com/b.mp4"]}),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .post(
            "/api/video/merge",
            json!({"videoUrls": ["https://cdn.example.com/a.mp4", "file:///etc/passwd"]}),
            Some("user-7"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.sink.keys().await.is_empty());
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = TestApp::new(StubBackend::new());

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let response = app
        .router
        .clone()
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
}

#[tokio::test]
async fn test_extract_context_returns_scene() {
    let app = TestApp::new(StubBackend::new());

    let (status, body) = app
        .upload(multipart_body("files", "video/webm", b"\x1aE\xdf\xa3clip"))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["environment"], "city street at dusk");
    assert_eq!(body["entities"][0]["id"], "id-1");
    assert_eq!(body["style"], "cinematic");

    let calls = app.backend.calls();
    assert!(matches!(
        calls.as_slice(),
        [StubCall::AnalyzeVideo { mime_type, .. }] if mime_type == "video/webm"
    ));
}

#[tokio::test]
async fn test_extract_context_without_file_is_bad_request() {
    let app = TestApp::new(StubBackend::new());

    let (status, body) = app
        .upload(multipart_body("other", "video/mp4", b"clip"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Bad request: No file provided");

    let (status, _) = app.post("/api/gemini/extract-context", json!({}), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.backend.calls().is_empty());
}

#[tokio::test]
async fn test_extract_context_non_json_reply_keeps_raw() {
    let app = TestApp::new(StubBackend::new().with_scene("A fox walks through snow."));

    let (status, body) = app
        .upload(multipart_body("files", "video/mp4", b"clip"))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["detail"], "Failed to parse JSON");
    assert_eq!(body["raw"], "A fox walks through snow.");
}

#[tokio::test]
async fn test_extract_context_backend_failure_is_bad_gateway() {
    let app = TestApp::new(StubBackend::new().failing_at(StubStep::AnalyzeVideo));

    let (status, body) = app
        .upload(multipart_body("files", "video/mp4", b"clip"))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.get("raw").is_none());
}

#[tokio::test]
async fn test_slow_poll_times_out_with_408() {
    let app = TestApp::slow(Duration::from_secs(5), Duration::from_millis(100));

    let (status, _) = app
        .get("/api/video/550e8400-e29b-41d4-a716-446655440000")
        .await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);

    let (status, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
}
