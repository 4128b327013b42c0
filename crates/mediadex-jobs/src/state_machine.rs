//! Job state machine with validated transitions.
//!
//! Pending -> Submitted -> Polling -> Generating -> Finished
//! Generating -> Polling when the poll/ingest stage is retried
//! Submitted -> Generating for document jobs, which have nothing to poll
//! Any non-terminal state -> Failed

use mediadex_core::JobStatus;

use crate::error::JobError;

/// Validate that a status transition is allowed.
pub fn validate_transition(from: JobStatus, to: JobStatus) -> Result<(), JobError> {
    let valid = matches!(
        (from, to),
        (JobStatus::Pending, JobStatus::Submitted)
            | (JobStatus::Submitted, JobStatus::Polling)
            | (JobStatus::Submitted, JobStatus::Generating)
            | (JobStatus::Polling, JobStatus::Generating)
            | (JobStatus::Generating, JobStatus::Polling)
            | (JobStatus::Generating, JobStatus::Finished)
            | (JobStatus::Pending, JobStatus::Failed)
            | (JobStatus::Submitted, JobStatus::Failed)
            | (JobStatus::Polling, JobStatus::Failed)
            | (JobStatus::Generating, JobStatus::Failed)
    );

    if valid {
        Ok(())
    } else {
        Err(JobError::InvalidTransition(from, to))
    }
}
