//! Orchestrator error types.

use thiserror::Error;
use vgen_genai::GenAiError;
use vgen_store::StoreError;

pub type JobResult<T> = Result<T, JobError>;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenAiError),

    #[error("Pipeline task failed: {0}")]
    TaskFailed(String),
}

impl JobError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn task_failed(msg: impl Into<String>) -> Self {
        Self::TaskFailed(msg.into())
    }
}

impl From<validator::ValidationErrors> for JobError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}
