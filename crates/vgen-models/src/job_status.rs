//! Job status as reported to pollers.
//!
//! [`JobStatus`] is derived on every poll from whichever record is present in
//! the store; it is never persisted itself.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Registered, pipeline not finished with its prerequisites yet
    #[default]
    Pending,
    /// Generation operation is in flight
    Waiting,
    /// Video is ready
    Done,
    /// Pipeline or generation failed
    Error,
}

impl JobState {
    /// Get string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Waiting => "waiting",
            JobState::Done => "done",
            JobState::Error => "error",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of a job returned by a status query.
///
/// Only the constructors below can build a value, so a `Done` status always
/// carries a video URL, an `Error` status always carries a message, and
/// non-terminal statuses carry neither.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    status: JobState,
    start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    metadata: BTreeMap<String, String>,
}

impl JobStatus {
    fn bare(status: JobState, start_time: DateTime<Utc>) -> Self {
        Self {
            status,
            start_time,
            end_time: None,
            video_url: None,
            error: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Job in progress.
    pub fn waiting(start_time: DateTime<Utc>) -> Self {
        Self::bare(JobState::Waiting, start_time)
    }

    /// Job finished with a playable video.
    pub fn done(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        video_url: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            status: JobState::Done,
            start_time,
            end_time: Some(end_time),
            video_url: Some(video_url.into()),
            error: None,
            metadata,
        }
    }

    /// Job failed.
    pub fn failed(start_time: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::bare(JobState::Error, start_time)
        }
    }

    pub fn status(&self) -> JobState {
        self.status
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// When completion was observed by a poller (not when the backend finished).
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    pub fn video_url(&self) -> Option<&str> {
        self.video_url.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}
