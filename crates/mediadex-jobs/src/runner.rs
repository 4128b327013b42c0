//! Worker pool that runs jobs off the request path.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use mediadex_core::JobKind;

use crate::error::JobError;
use crate::pipeline::Pipeline;
use crate::store::{JobStatusView, JobStore};

/// Accepts jobs and runs each on its own task, at most `max_concurrent` at
/// a time. Cancellation is cooperative: a cancelled job stops at its next
/// checkpoint and ends Failed.
pub struct JobRunner {
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
    tokens: Arc<Mutex<HashMap<Uuid, CancellationToken>>>,
    shutdown: CancellationToken,
}

impl JobRunner {
    pub fn new(pipeline: Arc<Pipeline>, max_concurrent: usize) -> Self {
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tokens: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn jobs(&self) -> &Arc<JobStore> {
        self.pipeline.jobs()
    }

    /// Queue a job and return its id without waiting for it to run.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn submit(&self, kind: JobKind) -> Result<Uuid, JobError> {
        validate(&kind)?;
        let job = self.jobs().create(kind)?;
        let id = job.id;

        let token = self.shutdown.child_token();
        self.tokens
            .lock()
            .map_err(|e| JobError::Storage(format!("Lock poisoned: {}", e)))?
            .insert(id, token.clone());

        let pipeline = Arc::clone(&self.pipeline);
        let permits = Arc::clone(&self.permits);
        let tokens = Arc::clone(&self.tokens);
        tokio::spawn(async move {
            // A job cancelled while queued still runs, to record its failure.
            let _permit = tokio::select! {
                permit = permits.acquire_owned() => permit.ok(),
                _ = token.cancelled() => None,
            };
            if let Err(e) = pipeline.run(id, &token).await {
                debug!(job_id = %id, error = %e, "Job ended with error");
            }
            if let Ok(mut tokens) = tokens.lock() {
                tokens.remove(&id);
            }
        });

        info!(job_id = %id, name = %job.kind.display_name(), "Job queued");
        Ok(id)
    }

    /// Ask a running job to stop. Returns false if it already finished.
    pub fn cancel(&self, id: Uuid) -> Result<bool, JobError> {
        let job = self.jobs().get(id)?;
        if job.status.is_terminal() {
            return Ok(false);
        }
        let tokens = self
            .tokens
            .lock()
            .map_err(|e| JobError::Storage(format!("Lock poisoned: {}", e)))?;
        match tokens.get(&id) {
            Some(token) => {
                token.cancel();
                info!(job_id = %id, "Job cancellation requested");
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn status(&self, id: Uuid) -> Result<JobStatusView, JobError> {
        self.jobs().status_view(id)
    }

    /// Cancel every job still in flight.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

fn validate(kind: &JobKind) -> Result<(), JobError> {
    match kind {
        JobKind::Video(video) => {
            if video.name.trim().is_empty() {
                return Err(JobError::Validation("video name is required".to_string()));
            }
            if video.media_path.trim().is_empty() {
                return Err(JobError::Validation("media path is required".to_string()));
            }
        }
        JobKind::Document(doc) => {
            if doc.path.as_os_str().is_empty() {
                return Err(JobError::Validation("document path is required".to_string()));
            }
        }
    }
    Ok(())
}
