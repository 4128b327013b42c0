//! Error types for the job pipeline.

use mediadex_core::{JobStatus, MediadexError};
use mediadex_gateway::GatewayError;
use mediadex_index::IndexError;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The gateway did not accept the media. Never retried.
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Network or timeout class failure.
    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },

    #[error("Timed out waiting for processing, last state: {last_state}")]
    Timeout { last_state: String },

    #[error("cancelled")]
    Cancelled,

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Artifact error: {0}")]
    Artifact(String),

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Invalid state transition: {0} -> {1}")]
    InvalidTransition(JobStatus, JobStatus),

    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid job: {0}")]
    Validation(String),

    #[error("Progress report failed: {0}")]
    Report(String),

    #[error("Job store error: {0}")]
    Storage(String),
}

impl JobError {
    /// Whether the retry stage should try again after this error.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            JobError::Transient(_) | JobError::Index(IndexError::Unavailable(_))
        )
    }
}

impl From<GatewayError> for JobError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Transient(msg) => JobError::Transient(msg),
            GatewayError::Submission(msg) => JobError::Submission(msg),
            GatewayError::Validation(e) => JobError::Validation(e.to_string()),
            other => JobError::Processing(other.to_string()),
        }
    }
}

impl From<JobError> for MediadexError {
    fn from(err: JobError) -> Self {
        MediadexError::Job(err.to_string())
    }
}
