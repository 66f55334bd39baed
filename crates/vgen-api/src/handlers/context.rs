//! Scene context extraction handler.

use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::extract::State;
use axum::Json;
use tracing::{info, warn};

use vgen_genai::VideoData;
use vgen_models::{parse_scene_context, SceneContext, SCENE_CONTEXT_PROMPT};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Multipart field carrying the clip.
pub const VIDEO_FIELD: &str = "files";

const DEFAULT_VIDEO_MIME: &str = "video/mp4";

/// Describe the entities, setting and style of an uploaded clip.
pub async fn extract_context(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<SceneContext>> {
    let mut multipart = multipart.map_err(|_| ApiError::bad_request("No file provided"))?;
    let video = read_video(&mut multipart)
        .await?
        .ok_or_else(|| ApiError::bad_request("No file provided"))?;

    let reply = state
        .backend
        .analyze_video(SCENE_CONTEXT_PROMPT, &video)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let scene = parse_scene_context(&reply).map_err(|e| {
        warn!(error = %e, "Scene reply is not valid JSON");
        ApiError::UnparseableReply { raw: reply.clone() }
    })?;

    info!(
        bytes = video.bytes.len(),
        entities = scene.entities.len(),
        "Scene context extracted"
    );
    Ok(Json(scene))
}

async fn read_video(multipart: &mut Multipart) -> ApiResult<Option<VideoData>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.to_string()))?
    {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let mime_type = match field.content_type() {
            Some(ct) if ct.starts_with("video/") => ct.to_string(),
            _ => DEFAULT_VIDEO_MIME.to_string(),
        };
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(VideoData::new(bytes.to_vec(), mime_type)));
    }

    Ok(None)
}
