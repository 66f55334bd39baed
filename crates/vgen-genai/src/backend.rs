//! The generation capability consumed by the job pipeline.

use async_trait::async_trait;

use vgen_models::OperationHandle;

use crate::error::GenAiResult;

/// Encoded image plus its MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageData {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Wrap raw bytes, detecting the MIME type from the file signature.
    ///
    /// Unknown signatures are labelled `image/png`, which is what the
    /// frontend exports.
    pub fn sniff(bytes: Vec<u8>) -> Self {
        let mime_type = detect_mime(&bytes);
        Self::new(bytes, mime_type)
    }
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

fn detect_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

/// Encoded video clip plus its MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct VideoData {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl VideoData {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }
}

impl std::fmt::Debug for VideoData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoData")
            .field("bytes", &self.bytes.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// Parameters for a video generation request.
#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub prompt: String,
    pub start_frame: ImageData,
    pub end_frame: Option<ImageData>,
    pub duration_seconds: u32,
}

/// Result of polling a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OperationStatus {
    pub done: bool,
    /// Storage URI of the generated video, once done
    pub video_uri: Option<String>,
    /// Failure reported by the backend, once done
    pub error: Option<String>,
}

impl OperationStatus {
    pub fn running() -> Self {
        Self::default()
    }

    pub fn completed(video_uri: impl Into<String>) -> Self {
        Self {
            done: true,
            video_uri: Some(video_uri.into()),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            done: true,
            video_uri: None,
            error: Some(message.into()),
        }
    }
}

/// Image and video analysis, image editing and video synthesis.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Describe the image according to `prompt`.
    async fn analyze_image(&self, prompt: &str, image: &ImageData) -> GenAiResult<String>;

    /// Describe the clip according to `prompt`; used for scene extraction.
    async fn analyze_video(&self, prompt: &str, video: &VideoData) -> GenAiResult<String>;

    /// Produce an edited copy of `image` according to `prompt`.
    async fn generate_image(&self, prompt: &str, image: &ImageData) -> GenAiResult<ImageData>;

    /// Start a video generation and return its operation handle.
    async fn generate_video(&self, request: VideoRequest) -> GenAiResult<OperationHandle>;

    /// Check on a previously started generation.
    async fn poll_operation(&self, handle: &OperationHandle) -> GenAiResult<OperationStatus>;
}
