//! Runs one job from Pending to a terminal state.
//!
//! Video jobs: submit (never retried), then poll, fetch content, write the
//! artifact and insert it into the index, all inside the retry policy.
//! Document jobs skip the gateway and only run the insert under the policy.
//! Either way the outcome is recorded on the job and published as a
//! `Finished` or `Failed` progress update.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use mediadex_core::{
    parse_percent, DocumentJob, JobKind, JobStatus, MediadexConfig, ProgressUpdate, VideoJob,
    PROGRESS_FAILED, PROGRESS_FINISHED,
};
use mediadex_gateway::{GatewayError, GatewayStatus, MediaGateway};
use mediadex_index::IndexApi;

use crate::error::JobError;
use crate::poll::{wait_for_processing, PollOutcome, PollSettings};
use crate::reporter::ProgressReporter;
use crate::retry::RetryPolicy;
use crate::store::JobStore;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub poll: PollSettings,
    pub retry: RetryPolicy,
    /// Where generated content artifacts are written.
    pub artifact_dir: PathBuf,
}

impl PipelineSettings {
    pub fn from_config(config: &MediadexConfig) -> Self {
        Self {
            poll: PollSettings::from_config(config),
            retry: RetryPolicy::new(
                config.jobs.max_retries,
                Duration::from_secs(config.jobs.retry_backoff_secs),
            ),
            artifact_dir: config.resolve(&config.jobs.artifact_dir),
        }
    }
}

/// What a successful run produced.
struct Completion {
    result: String,
    result_ref: Option<PathBuf>,
    video_id: Option<String>,
}

pub struct Pipeline {
    jobs: Arc<JobStore>,
    gateway: Arc<dyn MediaGateway>,
    index: Arc<dyn IndexApi>,
    reporter: Arc<dyn ProgressReporter>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        jobs: Arc<JobStore>,
        gateway: Arc<dyn MediaGateway>,
        index: Arc<dyn IndexApi>,
        reporter: Arc<dyn ProgressReporter>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            jobs,
            gateway,
            index,
            reporter,
            settings,
        }
    }

    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    /// Run job `id` to completion. The final state is on the job record;
    /// the returned error is only for the caller's logging.
    pub async fn run(&self, id: Uuid, cancel: &CancellationToken) -> Result<(), JobError> {
        let job = self.jobs.get(id)?;
        let name = job.kind.display_name();
        info!(job_id = %id, name = %name, "Job started");

        let outcome = if cancel.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            match &job.kind {
                JobKind::Video(video) => self.run_video(id, video, cancel).await,
                JobKind::Document(doc) => self.run_document(id, doc, cancel).await,
            }
        };

        match outcome {
            Ok(done) => {
                self.jobs
                    .finish(id, done.result.clone(), done.result_ref.clone())?;
                info!(job_id = %id, name = %name, result = %done.result, "Job finished");
                let mut update = ProgressUpdate::new(&name, PROGRESS_FINISHED);
                if let Some(video_id) = done.video_id {
                    update = update.with_video_id(video_id);
                }
                self.publish(update).await;
                Ok(())
            }
            Err(e) => {
                error!(job_id = %id, name = %name, error = %e, "Job failed");
                self.jobs.fail(id, &e)?;
                self.publish(ProgressUpdate::new(&name, PROGRESS_FAILED)).await;
                Err(e)
            }
        }
    }

    async fn run_video(
        &self,
        id: Uuid,
        video: &VideoJob,
        cancel: &CancellationToken,
    ) -> Result<Completion, JobError> {
        let video_id = self
            .gateway
            .submit(video)
            .await
            .map_err(|e| match e {
                GatewayError::Submission(msg) => JobError::Submission(msg),
                other => JobError::Submission(other.to_string()),
            })?;
        let token = video_id.clone();
        self.jobs.transition_with(id, JobStatus::Submitted, |job| {
            job.external_token = Some(token);
        })?;
        info!(job_id = %id, video_id = %video_id, "Video submitted");

        let deadline = self.settings.poll.deadline_from_now();
        let (artifact, doc_id) = self
            .settings
            .retry
            .run(
                cancel,
                |_, _| {
                    if let Err(e) = self.jobs.record_retry(id) {
                        warn!(job_id = %id, error = %e, "Failed to record retry");
                    }
                },
                |_| self.video_attempt(id, video, &video_id, deadline, cancel),
            )
            .await?;

        Ok(Completion {
            result: doc_id,
            result_ref: Some(artifact),
            video_id: Some(video_id),
        })
    }

    /// One pass of the retried stage: poll, fetch, store, insert.
    async fn video_attempt(
        &self,
        id: Uuid,
        video: &VideoJob,
        video_id: &str,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> Result<(PathBuf, String), JobError> {
        self.jobs.ensure_status(id, JobStatus::Polling)?;

        let outcome = wait_for_processing(
            self.gateway.as_ref(),
            video_id,
            &video.language,
            self.settings.poll.interval,
            deadline,
            cancel,
            |status| self.observe(id, &video.name, status),
        )
        .await?;

        match outcome {
            PollOutcome::Processed(_) => {}
            PollOutcome::Failed(status) => {
                return Err(JobError::Processing(format!(
                    "gateway reported {} at {}",
                    status.state, status.progress
                )))
            }
            PollOutcome::TimedOut(status) => {
                return Err(JobError::Timeout {
                    last_state: status.state,
                })
            }
        }

        self.jobs.update_status(id, JobStatus::Generating)?;
        let content = tokio::select! {
            content = self.gateway.fetch_content(video_id) => content?,
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
        };

        let artifact = video.artifact_path(&self.settings.artifact_dir);
        write_artifact(&artifact, &content).await?;
        let doc_id = artifact
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| JobError::Artifact(format!("{} has no file name", artifact.display())))?;

        let stored = self.index.insert(&artifact, Some(doc_id)).await?;
        info!(job_id = %id, doc_id = %stored, "Video content indexed");
        Ok((artifact, stored))
    }

    async fn run_document(
        &self,
        id: Uuid,
        doc: &DocumentJob,
        cancel: &CancellationToken,
    ) -> Result<Completion, JobError> {
        self.jobs.update_status(id, JobStatus::Submitted)?;
        self.jobs.update_status(id, JobStatus::Generating)?;

        let stored = self
            .settings
            .retry
            .run(
                cancel,
                |_, _| {
                    if let Err(e) = self.jobs.record_retry(id) {
                        warn!(job_id = %id, error = %e, "Failed to record retry");
                    }
                },
                |_| async {
                    Ok::<_, JobError>(self.index.insert(&doc.path, doc.doc_id.clone()).await?)
                },
            )
            .await?;

        Ok(Completion {
            result: stored,
            result_ref: Some(doc.path.clone()),
            video_id: None,
        })
    }

    async fn observe(&self, id: Uuid, name: &str, status: GatewayStatus) {
        if let Some(percent) = parse_percent(&status.progress) {
            if let Err(e) = self.jobs.modify(id, |job| job.progress_percent = Some(percent)) {
                warn!(job_id = %id, error = %e, "Failed to record progress");
            }
        }
        self.publish(ProgressUpdate::new(name, status.progress)).await;
    }

    /// Progress is best effort; a failed report never fails the job.
    async fn publish(&self, update: ProgressUpdate) {
        let name = update.video_name.clone();
        if let Err(e) = self.reporter.report(update).await {
            warn!(name = %name, error = %e, "Progress report failed");
        }
    }
}

async fn write_artifact(path: &Path, content: &serde_json::Value) -> Result<(), JobError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| JobError::Artifact(format!("{}: {}", parent.display(), e)))?;
    }
    let data = serde_json::to_vec_pretty(content)
        .map_err(|e| JobError::Artifact(e.to_string()))?;
    tokio::fs::write(path, data)
        .await
        .map_err(|e| JobError::Artifact(format!("{}: {}", path.display(), e)))
}
