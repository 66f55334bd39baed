//! Job definitions for video generation.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::job_status::JobState;

/// Default clip length requested from the video model.
pub const DEFAULT_DURATION_SECONDS: u32 = 6;

/// Metadata key under which the annotation description is stored.
pub const METADATA_ANNOTATIONS: &str = "annotations";

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a long-running generation request on the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationHandle(pub String);

impl OperationHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request to generate a video from a starting frame.
///
/// Image bytes live only in memory for the duration of the pipeline; the
/// persisted job carries a [`JobRequestSummary`] instead.
#[derive(Clone, Validate)]
pub struct JobRequest {
    /// Encoded starting image (PNG/JPEG)
    #[validate(length(min = 1, message = "starting image is required"))]
    pub starting_image: Vec<u8>,

    /// Optional encoded ending image
    pub ending_image: Option<Vec<u8>>,

    /// Free-text prompt for this clip
    #[validate(length(max = 4000))]
    pub custom_prompt: String,

    /// Free-text context shared across the whole board
    #[validate(length(max = 8000))]
    pub global_context: String,

    /// Target clip length in seconds
    #[validate(range(min = 4, max = 8))]
    pub duration_seconds: u32,
}

impl JobRequest {
    /// Create a request with the default duration and no ending frame.
    pub fn new(
        starting_image: Vec<u8>,
        custom_prompt: impl Into<String>,
        global_context: impl Into<String>,
    ) -> Self {
        Self {
            starting_image,
            ending_image: None,
            custom_prompt: custom_prompt.into(),
            global_context: global_context.into(),
            duration_seconds: DEFAULT_DURATION_SECONDS,
        }
    }

    /// Attach an ending frame.
    pub fn with_ending_image(mut self, image: Vec<u8>) -> Self {
        self.ending_image = Some(image);
        self
    }

    /// Override the target duration.
    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration_seconds = seconds;
        self
    }

    /// The persistable part of the request.
    pub fn summary(&self) -> JobRequestSummary {
        JobRequestSummary {
            custom_prompt: self.custom_prompt.clone(),
            global_context: self.global_context.clone(),
            duration_seconds: self.duration_seconds,
            has_ending_image: self.ending_image.is_some(),
        }
    }
}

impl fmt::Debug for JobRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRequest")
            .field("starting_image_bytes", &self.starting_image.len())
            .field(
                "ending_image_bytes",
                &self.ending_image.as_ref().map(Vec::len),
            )
            .field("custom_prompt", &self.custom_prompt)
            .field("global_context", &self.global_context)
            .field("duration_seconds", &self.duration_seconds)
            .finish()
    }
}

/// Request metadata persisted alongside a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequestSummary {
    pub custom_prompt: String,
    pub global_context: String,
    pub duration_seconds: u32,
    #[serde(default)]
    pub has_ending_image: bool,
}

/// Primary job record, written once the generation operation is in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Handle of the in-flight video generation
    pub operation: OperationHandle,

    /// Original request, without image bytes
    pub request: JobRequestSummary,

    /// When the job was submitted
    pub created_at: DateTime<Utc>,

    /// Derived data such as the annotation description
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl Job {
    pub fn new(
        id: JobId,
        operation: OperationHandle,
        request: JobRequestSummary,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            operation,
            request,
            created_at,
            metadata: BTreeMap::new(),
        }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Placeholder written before any pipeline work starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRecord {
    pub status: JobState,
    pub start_time: DateTime<Utc>,
}

impl PendingRecord {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            status: JobState::Pending,
            start_time,
        }
    }
}

/// Terminal record for a pipeline that failed before an operation existed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub status: JobState,
    pub message: String,
    pub start_time: DateTime<Utc>,
}

impl ErrorRecord {
    pub fn new(message: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            status: JobState::Error,
            message: message.into(),
            start_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_is_unique() {
        let a = JobId::new();
        let b = JobId::new();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_request_defaults() {
        let request = JobRequest::new(vec![1, 2, 3], "a cat jumps", "cartoon world");
        assert_eq!(request.duration_seconds, DEFAULT_DURATION_SECONDS);
        assert!(request.ending_image.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_requires_starting_image() {
        let request = JobRequest::new(Vec::new(), "prompt", "context");
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("starting_image"));
    }

    #[test]
    fn test_request_rejects_out_of_range_duration() {
        let request = JobRequest::new(vec![1], "prompt", "context").with_duration(30);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_summary_drops_image_bytes() {
        let request = JobRequest::new(vec![0; 1024], "prompt", "context")
            .with_ending_image(vec![0; 512])
            .with_duration(8);

        let summary = request.summary();
        assert_eq!(summary.custom_prompt, "prompt");
        assert_eq!(summary.duration_seconds, 8);
        assert!(summary.has_ending_image);

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.len() < 200);
    }

    #[test]
    fn test_debug_hides_image_bytes() {
        let request = JobRequest::new(vec![7; 64], "prompt", "context");
        let debug = format!("{:?}", request);
        assert!(debug.contains("starting_image_bytes: 64"));
        assert!(!debug.contains("7, 7"));
    }

    #[test]
    fn test_job_metadata_omitted_when_empty() {
        let job = Job::new(
            JobId::from_string("job-1"),
            OperationHandle::new("projects/p/operations/1"),
            JobRequest::new(vec![1], "p", "c").summary(),
            Utc::now(),
        );
        let json = serde_json::to_string(&job).unwrap();
        assert!(!json.contains("metadata"));

        let job = job.with_metadata(METADATA_ANNOTATIONS, "arrow pointing left");
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("arrow pointing left"));
    }
}
