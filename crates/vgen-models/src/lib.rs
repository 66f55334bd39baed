//! Shared data models for the video generation backend.
//!
//! This crate provides Serde-serializable types for:
//! - Generation requests and persisted job records
//! - Derived job status reported to pollers
//! - Prompt composition
//! - Scene context extracted from clips
//! - Storage URL helpers

pub mod job;
pub mod job_status;
pub mod prompt;
pub mod scene;
pub mod utils;

// Re-export common types
pub use job::{
    ErrorRecord, Job, JobId, JobRequest, JobRequestSummary, OperationHandle, PendingRecord,
    DEFAULT_DURATION_SECONDS, METADATA_ANNOTATIONS,
};
pub use job_status::{JobState, JobStatus};
pub use prompt::{
    build_video_prompt, parse_annotation_reply, ANNOTATION_ANALYSIS_PROMPT,
    ANNOTATION_REMOVAL_PROMPT,
};
pub use scene::{parse_scene_context, SceneContext, SceneEntity, SCENE_CONTEXT_PROMPT};
pub use utils::{public_video_url, validate_media_url, MediaUrlError};
