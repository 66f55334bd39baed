//! Streaming video merge for generated clips.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building for the concat demuxer
//! - A piped process runner with concurrent stdin/stdout/stderr pumps
//! - The [`MergePipeline`] that concatenates remote clips and uploads the result

pub mod command;
pub mod error;
pub mod manifest;
pub mod merge;

pub use command::{check_ffmpeg, FfmpegCommand, MuxerCommand, PipeRunner};
pub use error::{MediaError, MediaResult};
pub use manifest::ConcatManifest;
pub use merge::{merged_object_key, MergeConfig, MergePipeline, DEFAULT_MERGE_TIMEOUT_SECS};
