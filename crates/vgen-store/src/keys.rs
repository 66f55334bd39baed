//! Key schema for job records.
//!
//! Each job occupies up to three independent keys so that every state
//! transition is a single-key write:
//!
//! - `{prefix}:{id}:pending`: placeholder written at submission
//! - `{prefix}:{id}:error`: pipeline failure
//! - `{prefix}:{id}`: in-flight generation operation

use vgen_models::JobId;

/// Default key namespace.
pub const DEFAULT_KEY_PREFIX: &str = "job";

/// Builds store keys for a namespace.
#[derive(Debug, Clone)]
pub struct JobKeys {
    prefix: String,
}

impl Default for JobKeys {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl JobKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Key of the primary record.
    pub fn primary(&self, job_id: &JobId) -> String {
        format!("{}:{}", self.prefix, job_id)
    }

    /// Key of the pending placeholder.
    pub fn pending(&self, job_id: &JobId) -> String {
        format!("{}:{}:pending", self.prefix, job_id)
    }

    /// Key of the error record.
    pub fn error(&self, job_id: &JobId) -> String {
        format!("{}:{}:error", self.prefix, job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_key_schema() {
        let keys = JobKeys::default();
        let id = JobId::from_string("abc");
        assert_eq!(keys.primary(&id), "job:abc");
        assert_eq!(keys.pending(&id), "job:abc:pending");
        assert_eq!(keys.error(&id), "job:abc:error");
    }

    #[test]
    fn test_keys_are_id_scoped() {
        let keys = JobKeys::new("test");
        let a = JobId::from_string("a");
        let b = JobId::from_string("b");
        assert_ne!(keys.pending(&a), keys.pending(&b));
        assert_eq!(keys.pending(&a), "test:a:pending");
    }
}
