//! Vertex AI implementation of [`GenerationBackend`].
//!
//! Gemini `generateContent` handles image analysis, scene extraction and
//! cleanup; Veo `predictLongRunning` / `fetchPredictOperation` handle video
//! synthesis.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use vgen_models::OperationHandle;

use crate::backend::{GenerationBackend, ImageData, OperationStatus, VideoData, VideoRequest};
use crate::error::{GenAiError, GenAiResult};
use crate::token_cache::TokenCache;
use crate::types::{
    Content, FetchOperationRequest, FetchOperationResponse, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, InstanceImage, LongRunningOperation, Part,
    PredictRequest, VideoInstance, VideoParameters,
};

// =============================================================================
// Configuration
// =============================================================================

/// Vertex AI client configuration.
#[derive(Debug, Clone)]
pub struct VertexConfig {
    /// GCP project ID
    pub project_id: String,
    /// Region, or `global`
    pub location: String,
    /// Bucket receiving generated videos
    pub bucket: String,
    /// Model used for image analysis
    pub analysis_model: String,
    /// Model used for scene extraction from video clips
    pub context_model: String,
    /// Model used for annotation removal
    pub image_model: String,
    /// Model used for video synthesis
    pub video_model: String,
    /// Output aspect ratio
    pub aspect_ratio: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Static bearer token, bypasses service account auth
    pub access_token: Option<String>,
    /// Endpoint override (tests, private endpoints)
    pub api_base: Option<String>,
}

impl VertexConfig {
    /// Config with default models for a project, location and output bucket.
    pub fn new(
        project_id: impl Into<String>,
        location: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            location: location.into(),
            bucket: bucket.into(),
            analysis_model: "gemini-2.5-flash".to_string(),
            context_model: "gemini-2.0-flash".to_string(),
            image_model: "gemini-2.5-flash-image".to_string(),
            video_model: "veo-3.1-fast-generate-001".to_string(),
            aspect_ratio: "16:9".to_string(),
            timeout: Duration::from_secs(120),
            access_token: None,
            api_base: None,
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> GenAiResult<Self> {
        let project_id = std::env::var("GOOGLE_CLOUD_PROJECT")
            .map_err(|_| GenAiError::config_error("GOOGLE_CLOUD_PROJECT not set"))?;

        if project_id.is_empty() {
            return Err(GenAiError::config_error("GOOGLE_CLOUD_PROJECT cannot be empty"));
        }

        let bucket = std::env::var("GOOGLE_CLOUD_BUCKET_NAME")
            .map_err(|_| GenAiError::config_error("GOOGLE_CLOUD_BUCKET_NAME not set"))?;

        let location =
            std::env::var("GOOGLE_CLOUD_LOCATION").unwrap_or_else(|_| "us-central1".to_string());
        let mut config = Self::new(project_id, location, bucket);

        if let Ok(model) = std::env::var("VERTEX_ANALYSIS_MODEL") {
            config.analysis_model = model;
        }
        if let Ok(model) = std::env::var("VERTEX_CONTEXT_MODEL") {
            config.context_model = model;
        }
        if let Ok(model) = std::env::var("VERTEX_IMAGE_MODEL") {
            config.image_model = model;
        }
        if let Ok(model) = std::env::var("VERTEX_VIDEO_MODEL") {
            config.video_model = model;
        }
        if let Ok(ratio) = std::env::var("VERTEX_ASPECT_RATIO") {
            config.aspect_ratio = ratio;
        }
        config.timeout = Duration::from_secs(
            std::env::var("VERTEX_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(120),
        );
        config.access_token = std::env::var("VERTEX_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.is_empty());

        config.validate()?;
        Ok(config)
    }

    /// Veo only returns a fetchable URI when it writes to a bucket.
    pub fn validate(&self) -> GenAiResult<()> {
        if self.project_id.trim().is_empty() {
            return Err(GenAiError::config_error("project id cannot be empty"));
        }
        if self.bucket.trim().is_empty() || self.bucket.contains('/') {
            return Err(GenAiError::config_error(format!(
                "invalid output bucket: {:?}",
                self.bucket
            )));
        }
        Ok(())
    }

    fn host(&self) -> String {
        if let Some(base) = &self.api_base {
            return base.trim_end_matches('/').to_string();
        }
        if self.location == "global" {
            "https://aiplatform.googleapis.com".to_string()
        } else {
            format!("https://{}-aiplatform.googleapis.com", self.location)
        }
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:{}",
            self.host(),
            self.project_id,
            self.location,
            model,
            method
        )
    }

    fn storage_uri(&self) -> String {
        format!("gs://{}/videos/", self.bucket)
    }
}

// =============================================================================
// Client
// =============================================================================

enum Auth {
    Static(String),
    Provider(TokenCache),
}

impl Auth {
    async fn token(&self) -> GenAiResult<String> {
        match self {
            Auth::Static(token) => Ok(token.clone()),
            Auth::Provider(cache) => cache.get_token().await,
        }
    }

    async fn invalidate(&self) -> bool {
        match self {
            Auth::Static(_) => false,
            Auth::Provider(cache) => {
                cache.invalidate().await;
                true
            }
        }
    }
}

/// Vertex AI REST client.
#[derive(Clone)]
pub struct VertexBackend {
    http: Client,
    config: VertexConfig,
    auth: Arc<Auth>,
}

impl VertexBackend {
    /// Create a new client, resolving credentials.
    pub async fn new(config: VertexConfig) -> GenAiResult<Self> {
        config.validate()?;

        let auth = match &config.access_token {
            Some(token) => Auth::Static(token.clone()),
            None => Auth::Provider(TokenCache::new(Self::create_auth_provider().await?)),
        };

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("vgen-genai/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(GenAiError::Network)?;

        info!(
            project = %config.project_id,
            location = %config.location,
            video_model = %config.video_model,
            "Vertex AI backend configured"
        );

        Ok(Self {
            http,
            config,
            auth: Arc::new(auth),
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> GenAiResult<Self> {
        Self::new(VertexConfig::from_env()?).await
    }

    pub fn config(&self) -> &VertexConfig {
        &self.config
    }

    async fn create_auth_provider() -> GenAiResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            GenAiError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => gcp_auth::provider().await.map_err(|e| {
                GenAiError::auth_error(format!("No application default credentials: {}", e))
            }),
        }
    }

    /// POST a JSON body, retrying once with a fresh token on 401.
    async fn post_json<B, R>(&self, url: &str, body: &B) -> GenAiResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let token = self.auth.token().await?;
        let mut response = self.http.post(url).bearer_auth(&token).json(body).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED && self.auth.invalidate().await {
            warn!("Vertex AI rejected access token, refreshing");
            let token = self.auth.token().await?;
            response = self.http.post(url).bearer_auth(&token).json(body).send().await?;
        }

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenAiError::from_http_status(status.as_u16(), text));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            GenAiError::invalid_response(format!("Failed to parse Vertex AI response: {}", e))
        })
    }

    async fn generate_content(
        &self,
        model: &str,
        prompt: &str,
        mime_type: &str,
        data: &[u8],
        generation_config: Option<GenerationConfig>,
    ) -> GenAiResult<GenerateContentResponse> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::inline(mime_type, STANDARD.encode(data)),
                    Part::text(prompt),
                ],
            }],
            generation_config,
        };

        let url = self.config.model_url(model, "generateContent");
        let response: GenerateContentResponse = self.post_json(&url, &request).await?;

        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(GenAiError::Blocked(reason.to_string()));
        }

        Ok(response)
    }
}

/// Concatenated text parts of the first candidate.
fn response_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl GenerationBackend for VertexBackend {
    async fn analyze_image(&self, prompt: &str, image: &ImageData) -> GenAiResult<String> {
        debug!(model = %self.config.analysis_model, "Analyzing image");

        let response = self
            .generate_content(
                &self.config.analysis_model,
                prompt,
                &image.mime_type,
                &image.bytes,
                None,
            )
            .await?;

        let text = response_text(&response);
        if text.trim().is_empty() {
            return Err(GenAiError::invalid_response("No text in analysis response"));
        }

        Ok(text)
    }

    async fn analyze_video(&self, prompt: &str, video: &VideoData) -> GenAiResult<String> {
        debug!(
            model = %self.config.context_model,
            bytes = video.bytes.len(),
            "Analyzing video"
        );

        let generation_config = GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            ..Default::default()
        };
        let response = self
            .generate_content(
                &self.config.context_model,
                prompt,
                &video.mime_type,
                &video.bytes,
                Some(generation_config),
            )
            .await?;

        let text = response_text(&response);
        if text.trim().is_empty() {
            return Err(GenAiError::invalid_response("No text in video analysis response"));
        }

        Ok(text)
    }

    async fn generate_image(&self, prompt: &str, image: &ImageData) -> GenAiResult<ImageData> {
        debug!(model = %self.config.image_model, "Generating image");

        let generation_config = GenerationConfig {
            response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
            ..Default::default()
        };
        let response = self
            .generate_content(
                &self.config.image_model,
                prompt,
                &image.mime_type,
                &image.bytes,
                Some(generation_config),
            )
            .await?;

        let candidate = response
            .candidates
            .first()
            .ok_or_else(|| GenAiError::invalid_response("No candidates in image response"))?;

        let blob = candidate
            .content
            .as_ref()
            .and_then(|c| c.parts.iter().find_map(|p| p.inline_data.as_ref()))
            .ok_or_else(|| match candidate.finish_reason.as_deref() {
                Some(reason) if reason != "STOP" => GenAiError::Blocked(reason.to_string()),
                _ => GenAiError::invalid_response("No image in response"),
            })?;

        let bytes = STANDARD
            .decode(blob.data.as_bytes())
            .map_err(|e| GenAiError::invalid_response(format!("Invalid image data: {}", e)))?;

        Ok(ImageData::new(bytes, blob.mime_type.clone()))
    }

    async fn generate_video(&self, request: VideoRequest) -> GenAiResult<OperationHandle> {
        let encode = |image: &ImageData| InstanceImage {
            bytes_base64_encoded: STANDARD.encode(&image.bytes),
            mime_type: image.mime_type.clone(),
        };

        let body = PredictRequest {
            instances: vec![VideoInstance {
                prompt: request.prompt,
                image: encode(&request.start_frame),
                last_frame: request.end_frame.as_ref().map(encode),
            }],
            parameters: VideoParameters {
                aspect_ratio: self.config.aspect_ratio.clone(),
                duration_seconds: request.duration_seconds,
                sample_count: 1,
                storage_uri: self.config.storage_uri(),
            },
        };

        let url = self
            .config
            .model_url(&self.config.video_model, "predictLongRunning");
        let operation: LongRunningOperation = self.post_json(&url, &body).await?;

        if operation.name.is_empty() {
            return Err(GenAiError::invalid_response("Empty operation name"));
        }

        info!(operation = %operation.name, "Started video generation");
        Ok(OperationHandle::new(operation.name))
    }

    async fn poll_operation(&self, handle: &OperationHandle) -> GenAiResult<OperationStatus> {
        let body = FetchOperationRequest {
            operation_name: handle.as_str().to_string(),
        };
        let url = self
            .config
            .model_url(&self.config.video_model, "fetchPredictOperation");
        let operation: FetchOperationResponse = self.post_json(&url, &body).await?;

        if !operation.done {
            return Ok(OperationStatus::running());
        }

        if let Some(error) = operation.error {
            return Ok(OperationStatus::failed(format!(
                "Generation failed ({}): {}",
                error.code, error.message
            )));
        }

        let Some(response) = operation.response else {
            return Ok(OperationStatus::failed("Operation finished without a response"));
        };

        if let Some(uri) = response.videos.iter().find_map(|v| v.gcs_uri.clone()) {
            return Ok(OperationStatus::completed(uri));
        }

        if !response.rai_media_filtered_reasons.is_empty() {
            return Ok(OperationStatus::failed(format!(
                "Video was filtered: {}",
                response.rai_media_filtered_reasons.join("; ")
            )));
        }

        if response.videos.iter().any(|v| v.bytes_base64_encoded.is_some()) {
            return Ok(OperationStatus::failed(
                "Video was returned inline instead of written to the output bucket",
            ));
        }

        Ok(OperationStatus::failed("Operation finished without a video"))
    }
}
