//! Video generation job handlers.

use std::collections::BTreeMap;

use axum::extract::{Path, State};
use axum::Json;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use vgen_models::{JobId, JobRequest, JobState, JobStatus, DEFAULT_DURATION_SECONDS};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Body of `POST /api/video`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoRequest {
    /// Base64 image, optionally as a `data:` URL
    pub starting_image: String,
    #[serde(default)]
    pub ending_image: Option<String>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

impl CreateVideoRequest {
    fn into_job_request(self) -> ApiResult<JobRequest> {
        let starting_image = decode_image(&self.starting_image, "startingImage")?;
        let mut request = JobRequest::new(starting_image, self.prompt, self.context)
            .with_duration(self.duration_seconds.unwrap_or(DEFAULT_DURATION_SECONDS));

        if let Some(ending) = self.ending_image.as_deref().filter(|s| !s.is_empty()) {
            request = request.with_ending_image(decode_image(ending, "endingImage")?);
        }
        Ok(request)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoResponse {
    pub job_id: String,
}

/// Body of `GET /api/video/:job_id`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatusResponse {
    pub status: JobState,
    pub job_start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_end_time: Option<DateTime<Utc>>,
    #[serde(rename = "videoURL", skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, String>>,
}

impl From<JobStatus> for VideoStatusResponse {
    fn from(status: JobStatus) -> Self {
        let metadata = (status.status() == JobState::Done).then(|| status.metadata().clone());
        Self {
            status: status.status(),
            job_start_time: status.start_time(),
            job_end_time: status.end_time(),
            video_url: status.video_url().map(str::to_string),
            error: status.error().map(str::to_string),
            metadata,
        }
    }
}

/// Submit a generation job.
pub async fn create_video_job(
    State(state): State<AppState>,
    Json(body): Json<CreateVideoRequest>,
) -> ApiResult<Json<CreateVideoResponse>> {
    let request = body.into_job_request()?;
    let job_id = state.orchestrator.submit(request).await?;

    info!(job_id = %job_id, "Video job accepted");
    Ok(Json(CreateVideoResponse {
        job_id: job_id.to_string(),
    }))
}

/// Poll a generation job.
///
/// A `done` or `error` answer may be returned only once; the records behind
/// it are cleaned up or expire shortly after.
pub async fn get_video_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<VideoStatusResponse>> {
    // Ids are always UUIDs; anything else could address another record's key
    if Uuid::parse_str(&job_id).is_err() {
        return Err(ApiError::not_found("job not found"));
    }

    let status = state
        .orchestrator
        .get_status(&JobId::from_string(job_id))
        .await?
        .ok_or_else(|| ApiError::not_found("job not found"))?;

    Ok(Json(status.into()))
}

fn decode_image(value: &str, field: &str) -> ApiResult<Vec<u8>> {
    let encoded = match value.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => value,
    };

    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|e| ApiError::bad_request(format!("{} is not valid base64: {}", field, e)))?;

    if bytes.is_empty() {
        return Err(ApiError::bad_request(format!("{} is empty", field)));
    }
    Ok(bytes)
}
