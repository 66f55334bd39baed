//! Per-job generation pipeline and status polling.
//!
//! All state lives in the [`JobStore`]; the orchestrator holds nothing between
//! requests, so any number of replicas can serve submissions and polls.

use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::Instrument;
use validator::Validate;

use vgen_genai::{GenerationBackend, ImageData, VideoRequest};
use vgen_models::{
    build_video_prompt, parse_annotation_reply, public_video_url, ErrorRecord, Job, JobId,
    JobRequest, JobState, JobStatus, PendingRecord, ANNOTATION_ANALYSIS_PROMPT,
    ANNOTATION_REMOVAL_PROMPT, METADATA_ANNOTATIONS,
};
use vgen_store::JobStore;

use crate::error::{JobError, JobResult};
use crate::logging::JobLogger;
use crate::metrics;

/// Operation name attached to pipeline logs.
pub const OPERATION: &str = "video_generation";

/// Status message when the backend finishes without a video or an error.
const NO_VIDEO_MESSAGE: &str = "Generation finished without a video";

/// Drives video generation jobs against a [`GenerationBackend`].
#[derive(Clone)]
pub struct JobOrchestrator {
    store: JobStore,
    backend: Arc<dyn GenerationBackend>,
}

impl JobOrchestrator {
    pub fn new(store: JobStore, backend: Arc<dyn GenerationBackend>) -> Self {
        Self { store, backend }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Register a job and start its pipeline in the background.
    ///
    /// Returns once the pending record is stored, so a status query issued
    /// right after this returns never reports "not found".
    pub async fn submit(&self, request: JobRequest) -> JobResult<JobId> {
        self.submit_tracked(request).await.map(|(job_id, _)| job_id)
    }

    /// Like [`submit`](Self::submit), also returning a handle that resolves
    /// once the pipeline has written its terminal record.
    pub async fn submit_tracked(&self, request: JobRequest) -> JobResult<(JobId, JoinHandle<()>)> {
        request.validate()?;

        let job_id = JobId::new();
        let created_at = Utc::now();

        self.store
            .put_pending(&job_id, &PendingRecord::new(created_at))
            .await?;
        metrics::record_job_submitted();

        let handle = self.spawn_pipeline(job_id.clone(), request, created_at);
        Ok((job_id, handle))
    }

    fn spawn_pipeline(
        &self,
        job_id: JobId,
        request: JobRequest,
        created_at: DateTime<Utc>,
    ) -> JoinHandle<()> {
        let logger = JobLogger::new(&job_id, OPERATION);
        let span = logger.create_span();
        let this = self.clone();

        tokio::spawn(
            async move {
                logger.log_start(&format!("{:?}", request.summary()));

                // Run in a nested task so a panic surfaces as a JoinError
                let pipeline = tokio::spawn(
                    run_pipeline(Arc::clone(&this.backend), job_id.clone(), request, created_at)
                        .in_current_span(),
                );

                let outcome = match pipeline.await {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_panic() => Err(JobError::task_failed(panic_message(
                        e.into_panic(),
                    ))),
                    Err(e) => Err(JobError::task_failed(e.to_string())),
                };

                this.finish(&job_id, created_at, outcome, &logger).await;
            }
            .instrument(span),
        )
    }

    /// Persist the terminal record, then drop the pending one.
    async fn finish(
        &self,
        job_id: &JobId,
        created_at: DateTime<Utc>,
        outcome: JobResult<Job>,
        logger: &JobLogger,
    ) {
        let failure = match outcome {
            Ok(job) => match self.store.put_job(&job).await {
                Ok(()) => {
                    metrics::record_job_started();
                    logger.log_completion(&format!("operation {}", job.operation));
                    None
                }
                Err(e) => Some(("store", format!("Failed to save job: {}", e))),
            },
            Err(e) => Some((failure_stage(&e), e.to_string())),
        };

        if let Some((stage, message)) = failure {
            logger.log_error(&message);
            metrics::record_job_failed(stage);
            let record = ErrorRecord::new(message, created_at);
            if let Err(e) = self.store.put_error(job_id, &record).await {
                // Pending stays until its TTL so the job never reads as unknown
                logger.log_error(&format!("Failed to save error record: {}", e));
                return;
            }
        }

        if let Err(e) = self.store.delete_pending(job_id).await {
            logger.log_warning(&format!("Failed to delete pending record: {}", e));
        }
    }

    /// Current status of a job, or `None` if it is unknown or already consumed.
    ///
    /// A `done` or backend-reported `error` status is returned once; the
    /// primary record is deleted before returning it.
    pub async fn get_status(&self, job_id: &JobId) -> JobResult<Option<JobStatus>> {
        if let Some(pending) = self.store.get_pending(job_id).await? {
            return Ok(Some(JobStatus::waiting(pending.start_time)));
        }

        if let Some(failed) = self.store.get_error(job_id).await? {
            return Ok(Some(JobStatus::failed(failed.start_time, failed.message)));
        }

        let Some(job) = self.store.get_job(job_id).await? else {
            return Ok(None);
        };

        let operation = self.backend.poll_operation(&job.operation).await?;
        if !operation.done {
            return Ok(Some(JobStatus::waiting(job.created_at)));
        }

        let end_time = Utc::now();
        self.store.delete_job(job_id).await?;

        let status = match (operation.video_uri, operation.error) {
            (Some(uri), None) => {
                JobStatus::done(job.created_at, end_time, public_video_url(&uri), job.metadata)
            }
            (_, Some(message)) => JobStatus::failed(job.created_at, message),
            (None, None) => JobStatus::failed(job.created_at, NO_VIDEO_MESSAGE),
        };

        metrics::record_job_completed(status.status().as_str());
        let logger = JobLogger::new(job_id, OPERATION);
        match status.status() {
            JobState::Done => logger.log_completion("video ready"),
            _ => logger.log_error(status.error().unwrap_or(NO_VIDEO_MESSAGE)),
        }

        Ok(Some(status))
    }
}

/// Clean the frames and start generation.
///
/// Annotation analysis and frame cleanup are independent and run
/// concurrently; the first failure aborts the rest.
async fn run_pipeline(
    backend: Arc<dyn GenerationBackend>,
    job_id: JobId,
    request: JobRequest,
    created_at: DateTime<Utc>,
) -> JobResult<Job> {
    let summary = request.summary();
    let JobRequest {
        starting_image,
        ending_image,
        custom_prompt,
        global_context,
        duration_seconds,
    } = request;

    let start = ImageData::sniff(starting_image);
    let end = ending_image.map(ImageData::sniff);

    let clean_end = async {
        match &end {
            Some(image) => backend
                .generate_image(ANNOTATION_REMOVAL_PROMPT, image)
                .await
                .map(Some),
            None => Ok(None),
        }
    };

    let (analysis, clean_start, clean_end) = tokio::try_join!(
        backend.analyze_image(ANNOTATION_ANALYSIS_PROMPT, &start),
        backend.generate_image(ANNOTATION_REMOVAL_PROMPT, &start),
        clean_end,
    )?;

    let annotations = parse_annotation_reply(&analysis);
    let prompt = build_video_prompt(&custom_prompt, &global_context, annotations.as_deref());

    let operation = backend
        .generate_video(VideoRequest {
            prompt,
            start_frame: clean_start,
            end_frame: clean_end,
            duration_seconds,
        })
        .await?;

    let mut job = Job::new(job_id, operation, summary, created_at);
    if let Some(annotations) = annotations {
        job = job.with_metadata(METADATA_ANNOTATIONS, annotations);
    }
    Ok(job)
}

fn failure_stage(error: &JobError) -> &'static str {
    match error {
        JobError::Generation(_) => "generation",
        JobError::Store(_) => "store",
        JobError::TaskFailed(_) => "panic",
        JobError::Validation(_) => "validation",
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("pipeline panicked: {}", detail)
}
