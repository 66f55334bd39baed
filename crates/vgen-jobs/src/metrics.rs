//! Job pipeline metrics.

use metrics::counter;

pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "vgen_jobs_submitted_total";
    pub const JOBS_STARTED_TOTAL: &str = "vgen_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vgen_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vgen_jobs_failed_total";
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

/// Generation operation handed to the backend.
pub fn record_job_started() {
    counter!(names::JOBS_STARTED_TOTAL).increment(1);
}

/// Terminal status observed by a poller.
pub fn record_job_completed(status: &str) {
    let labels = [("status", status.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
}

/// Pipeline aborted before an operation existed.
pub fn record_job_failed(stage: &str) {
    let labels = [("stage", stage.to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}
