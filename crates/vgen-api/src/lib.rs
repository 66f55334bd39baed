//! Axum HTTP API server.
//!
//! This crate provides:
//! - Video generation job submission and polling
//! - Merging generated clips into one video
//! - Scene context extraction from uploaded clips
//! - Health, readiness and Prometheus metrics endpoints

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
