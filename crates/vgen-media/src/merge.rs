//! Streaming merge of remote clips into a single video.
//!
//! Remote inputs are read by FFmpeg directly over HTTP(S) and the merged
//! fragmented MP4 is collected from its stdout, so nothing touches local disk.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};
use uuid::Uuid;

use vgen_storage::StorageSink;

use crate::command::{MuxerCommand, PipeRunner};
use crate::error::{MediaError, MediaResult};
use crate::manifest::ConcatManifest;

/// Default deadline for a single merge.
pub const DEFAULT_MERGE_TIMEOUT_SECS: u64 = 600;

/// Content type of merged output.
pub const MERGED_CONTENT_TYPE: &str = "video/mp4";

/// Merge pipeline configuration.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Muxer invocation
    pub muxer: MuxerCommand,
    /// Deadline for the subprocess; `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            muxer: MuxerCommand::ffmpeg("ffmpeg"),
            timeout: Some(Duration::from_secs(DEFAULT_MERGE_TIMEOUT_SECS)),
        }
    }
}

impl MergeConfig {
    /// Create config from environment variables.
    ///
    /// `MERGE_TIMEOUT_SECS=0` disables the deadline.
    pub fn from_env() -> Self {
        let ffmpeg = std::env::var("FFMPEG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("ffmpeg"));

        let timeout_secs = std::env::var("MERGE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_MERGE_TIMEOUT_SECS);

        Self {
            muxer: MuxerCommand::ffmpeg(ffmpeg),
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }
}

/// Concatenates remote clips and uploads the result.
#[derive(Clone)]
pub struct MergePipeline {
    sink: Arc<dyn StorageSink>,
    config: MergeConfig,
}

impl MergePipeline {
    pub fn new(sink: Arc<dyn StorageSink>, config: MergeConfig) -> Self {
        Self { sink, config }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Merge `urls` in order and return the public URL of the result.
    ///
    /// A single URL is returned unchanged without spawning anything.
    pub async fn merge<S: AsRef<str>>(&self, urls: &[S], owner_id: &str) -> MediaResult<String> {
        match urls {
            [] => return Err(MediaError::validation("at least one video URL is required")),
            [only] => return Ok(only.as_ref().to_string()),
            _ => {}
        }

        validate_owner(owner_id)?;
        let manifest = ConcatManifest::from_urls(urls)?;
        let clips = manifest.len();

        info!(owner_id = %owner_id, clips, "Merging videos");
        let started = Instant::now();

        let result = PipeRunner::new()
            .with_timeout(self.config.timeout)
            .run(&self.config.muxer, manifest.into_bytes())
            .await;

        let output = match result {
            Ok(output) if output.is_empty() => {
                warn!(owner_id = %owner_id, "Merge produced no output");
                metrics::counter!("vgen_merges_total", "status" => "failed").increment(1);
                return Err(MediaError::EmptyOutput);
            }
            Ok(output) => output,
            Err(e) => {
                warn!(owner_id = %owner_id, "Merge failed: {}", e);
                metrics::counter!("vgen_merges_total", "status" => "failed").increment(1);
                return Err(e);
            }
        };

        let size = output.len();
        let key = merged_object_key(owner_id);
        let url = self.sink.upload(&key, output, MERGED_CONTENT_TYPE).await?;

        let elapsed = started.elapsed();
        metrics::counter!("vgen_merges_total", "status" => "success").increment(1);
        metrics::histogram!("vgen_merge_duration_seconds").record(elapsed.as_secs_f64());

        info!(
            owner_id = %owner_id,
            clips,
            bytes = size,
            duration_ms = elapsed.as_millis() as u64,
            "Merged video uploaded to {}",
            key
        );
        Ok(url)
    }
}

/// Object key for a merged video owned by `owner_id`.
pub fn merged_object_key(owner_id: &str) -> String {
    format!("videos/{}/merged_{}.mp4", owner_id, Uuid::new_v4())
}

fn validate_owner(owner_id: &str) -> MediaResult<()> {
    if owner_id.is_empty()
        || owner_id == "."
        || owner_id == ".."
        || owner_id.contains(['/', '\\'])
    {
        return Err(MediaError::validation(format!("invalid owner id: {:?}", owner_id)));
    }
    Ok(())
}
