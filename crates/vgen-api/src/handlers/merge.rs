//! Video merge handler.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Header carrying the caller's owner id.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MergeVideosRequest {
    #[validate(length(min = 2, message = "at least two video URLs are required"))]
    pub video_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeVideosResponse {
    pub video_url: String,
}

/// Concatenate clips and upload the result under the caller's prefix.
pub async fn merge_videos(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<MergeVideosRequest>,
) -> ApiResult<Json<MergeVideosResponse>> {
    let owner_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::unauthorized("missing X-User-Id header"))?;

    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let video_url = state.merger.merge(&body.video_urls, owner_id).await?;

    info!(owner_id = %owner_id, clips = body.video_urls.len(), "Merge completed");
    Ok(Json(MergeVideosResponse { video_url }))
}
