//! Generative backend for the video generation pipeline.
//!
//! [`GenerationBackend`] is the capability the job orchestrator consumes.
//! [`VertexBackend`] talks to Vertex AI; [`StubBackend`] returns canned
//! responses without network access.

pub mod backend;
pub mod error;
pub mod stub;
pub mod token_cache;
mod types;
pub mod vertex;

pub use backend::{GenerationBackend, ImageData, OperationStatus, VideoData, VideoRequest};
pub use error::{GenAiError, GenAiResult};
pub use stub::{StubBackend, StubCall, StubStep, CLEAN_MARKER};
pub use token_cache::TokenCache;
pub use vertex::{VertexBackend, VertexConfig};
