//! Video generation job orchestrator.
//!
//! This crate provides:
//! - Job submission with a pending record written before any background work
//! - The detached generation pipeline (fan-out cleanup, then video synthesis)
//! - Store-backed status polling with single consumption of terminal results

pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;

pub use error::{JobError, JobResult};
pub use logging::JobLogger;
pub use orchestrator::JobOrchestrator;
