//! Deterministic in-process backend for tests and local runs.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::watch;

use vgen_models::OperationHandle;

use crate::backend::{GenerationBackend, ImageData, OperationStatus, VideoData, VideoRequest};
use crate::error::{GenAiError, GenAiResult};

/// Prefix the stub prepends to every "cleaned" image.
pub const CLEAN_MARKER: &[u8] = b"clean:";

const DEFAULT_SCENE: &str = r#"{"entities":[{"id":"id-1","description":"a person","appearance":"red jacket"}],"environment":"city street at dusk","style":"cinematic"}"#;

/// A backend capability the stub can be told to fail or panic in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StubStep {
    AnalyzeImage,
    AnalyzeVideo,
    GenerateImage,
    GenerateVideo,
    PollOperation,
}

/// A call recorded by [`StubBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubCall {
    AnalyzeImage {
        prompt: String,
    },
    AnalyzeVideo {
        prompt: String,
        mime_type: String,
    },
    GenerateImage {
        prompt: String,
        image: Vec<u8>,
    },
    GenerateVideo {
        prompt: String,
        start_frame: Vec<u8>,
        end_frame: Option<Vec<u8>>,
        duration_seconds: u32,
    },
    PollOperation(OperationHandle),
}

/// Canned-response [`GenerationBackend`].
///
/// - `analyze_image` returns the configured annotation reply (`NONE` by default)
/// - `analyze_video` returns the configured scene reply (a small scene JSON by default)
/// - `generate_image` returns the input prefixed with [`CLEAN_MARKER`]
/// - `generate_video` returns `operations/stub-{n}`, optionally blocking until
///   [`StubBackend::release`] is called
/// - `poll_operation` pops scripted results, then reports completion at
///   `gs://stub-bucket/videos/{n}.mp4`
pub struct StubBackend {
    annotations: String,
    scene: String,
    fail_at: Option<StubStep>,
    panic_at: Option<StubStep>,
    gate: watch::Sender<bool>,
    polls: Mutex<VecDeque<OperationStatus>>,
    calls: Mutex<Vec<StubCall>>,
    counter: AtomicU64,
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StubBackend {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            annotations: "NONE".to_string(),
            scene: DEFAULT_SCENE.to_string(),
            fail_at: None,
            panic_at: None,
            gate,
            polls: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            counter: AtomicU64::new(0),
        }
    }

    /// Reply returned by `analyze_image`.
    pub fn with_annotations(mut self, reply: impl Into<String>) -> Self {
        self.annotations = reply.into();
        self
    }

    /// Reply returned by `analyze_video`.
    pub fn with_scene(mut self, reply: impl Into<String>) -> Self {
        self.scene = reply.into();
        self
    }

    /// Return an error from `step`.
    pub fn failing_at(mut self, step: StubStep) -> Self {
        self.fail_at = Some(step);
        self
    }

    /// Panic inside `step`.
    pub fn panicking_at(mut self, step: StubStep) -> Self {
        self.panic_at = Some(step);
        self
    }

    /// Queue results for subsequent `poll_operation` calls.
    pub fn with_poll_results(self, results: impl IntoIterator<Item = OperationStatus>) -> Self {
        if let Ok(mut polls) = self.polls.lock() {
            polls.extend(results);
        }
        self
    }

    /// Make `generate_video` wait until [`release`](Self::release).
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<StubCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: StubCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn check(&self, step: StubStep) -> GenAiResult<()> {
        if self.panic_at == Some(step) {
            panic!("stub backend panicked in {:?}", step);
        }
        if self.fail_at == Some(step) {
            return Err(GenAiError::RequestFailed(format!(
                "stub backend failed in {:?}",
                step
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl GenerationBackend for StubBackend {
    async fn analyze_image(&self, prompt: &str, _image: &ImageData) -> GenAiResult<String> {
        self.record(StubCall::AnalyzeImage {
            prompt: prompt.to_string(),
        });
        self.check(StubStep::AnalyzeImage)?;
        Ok(self.annotations.clone())
    }

    async fn analyze_video(&self, prompt: &str, video: &VideoData) -> GenAiResult<String> {
        self.record(StubCall::AnalyzeVideo {
            prompt: prompt.to_string(),
            mime_type: video.mime_type.clone(),
        });
        self.check(StubStep::AnalyzeVideo)?;
        Ok(self.scene.clone())
    }

    async fn generate_image(&self, prompt: &str, image: &ImageData) -> GenAiResult<ImageData> {
        self.record(StubCall::GenerateImage {
            prompt: prompt.to_string(),
            image: image.bytes.clone(),
        });
        self.check(StubStep::GenerateImage)?;

        let mut bytes = CLEAN_MARKER.to_vec();
        bytes.extend_from_slice(&image.bytes);
        Ok(ImageData::new(bytes, image.mime_type.clone()))
    }

    async fn generate_video(&self, request: VideoRequest) -> GenAiResult<OperationHandle> {
        self.record(StubCall::GenerateVideo {
            prompt: request.prompt.clone(),
            start_frame: request.start_frame.bytes.clone(),
            end_frame: request.end_frame.as_ref().map(|f| f.bytes.clone()),
            duration_seconds: request.duration_seconds,
        });

        let mut gate = self.gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|_| GenAiError::RequestFailed("stub gate closed".to_string()))?;

        self.check(StubStep::GenerateVideo)?;

        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(OperationHandle::new(format!("operations/stub-{}", n)))
    }

    async fn poll_operation(&self, handle: &OperationHandle) -> GenAiResult<OperationStatus> {
        self.record(StubCall::PollOperation(handle.clone()));
        self.check(StubStep::PollOperation)?;

        let scripted = self.polls.lock().ok().and_then(|mut p| p.pop_front());
        Ok(scripted.unwrap_or_else(|| {
            let name = handle.as_str().rsplit('/').next().unwrap_or("video");
            OperationStatus::completed(format!("gs://stub-bucket/videos/{}.mp4", name))
        }))
    }
}
