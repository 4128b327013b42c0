//! In-memory job table.
//!
//! Only the worker running a job mutates it; readers get clones. Finished
//! and failed jobs are kept up to a retention cap, oldest dropped first.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use tracing::debug;

use mediadex_core::{Job, JobKind, JobStatus, MediadexConfig, TaskState};

use crate::error::JobError;
use crate::state_machine::validate_transition;

/// What the job-status interface returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub name: String,
    pub status: JobStatus,
    pub state: TaskState,
    pub progress_percent: Option<u8>,
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        let progress_percent = match job.status {
            JobStatus::Finished => Some(100),
            _ => job.progress_percent,
        };
        Self {
            job_id: job.id,
            name: job.kind.display_name(),
            status: job.status,
            state: job.status.into(),
            progress_percent,
            retry_count: job.retry_count,
            result: job.result.clone(),
            error: job.error.clone(),
        }
    }
}

/// Terminal jobs kept when nothing else is configured.
pub const DEFAULT_RETAINED_JOBS: usize = 1000;

pub struct JobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
    /// Terminal job ids in the order they ended.
    ended: Mutex<VecDeque<Uuid>>,
    retained: usize,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::with_retention(DEFAULT_RETAINED_JOBS)
    }
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `retained` terminal jobs. Never less than one, so a
    /// job that just ended can still be looked up.
    pub fn with_retention(retained: usize) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            ended: Mutex::new(VecDeque::new()),
            retained: retained.max(1),
        }
    }

    pub fn from_config(config: &MediadexConfig) -> Self {
        Self::with_retention(config.jobs.retained_jobs)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Job>>, JobError> {
        self.jobs
            .lock()
            .map_err(|e| JobError::Storage(format!("Lock poisoned: {}", e)))
    }

    /// Register a new Pending job.
    pub fn create(&self, kind: JobKind) -> Result<Job, JobError> {
        let job = Job::new(kind);
        self.lock()?.insert(job.id, job.clone());
        Ok(job)
    }

    pub fn get(&self, id: Uuid) -> Result<Job, JobError> {
        self.lock()?.get(&id).cloned().ok_or(JobError::NotFound(id))
    }

    pub fn status_view(&self, id: Uuid) -> Result<JobStatusView, JobError> {
        self.lock()?
            .get(&id)
            .map(JobStatusView::from)
            .ok_or(JobError::NotFound(id))
    }

    /// All jobs, newest first.
    pub fn list(&self, status: Option<JobStatus>, limit: Option<usize>) -> Vec<Job> {
        let jobs = match self.lock() {
            Ok(j) => j,
            Err(_) => return vec![],
        };

        let mut result: Vec<Job> = jobs
            .values()
            .filter(|j| status.map_or(true, |s| j.status == s))
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = limit {
            result.truncate(limit);
        }
        result
    }

    /// Move to `to` and apply `f` under the same lock.
    pub fn transition_with<F>(&self, id: Uuid, to: JobStatus, f: F) -> Result<Job, JobError>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.lock()?;
        let job = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        validate_transition(job.status, to)?;
        job.status = to;
        f(job);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    pub fn update_status(&self, id: Uuid, to: JobStatus) -> Result<Job, JobError> {
        self.transition_with(id, to, |_| {})
    }

    /// Move to `to` unless the job is already there.
    pub fn ensure_status(&self, id: Uuid, to: JobStatus) -> Result<Job, JobError> {
        let current = self.get(id)?;
        if current.status == to {
            return Ok(current);
        }
        self.update_status(id, to)
    }

    /// Apply `f` without a status change.
    pub fn modify<F>(&self, id: Uuid, f: F) -> Result<Job, JobError>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.lock()?;
        let job = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        f(job);
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    pub fn record_retry(&self, id: Uuid) -> Result<u32, JobError> {
        self.modify(id, |job| job.retry_count += 1)
            .map(|job| job.retry_count)
    }

    pub fn finish(
        &self,
        id: Uuid,
        result: String,
        result_ref: Option<PathBuf>,
    ) -> Result<Job, JobError> {
        let job = self.transition_with(id, JobStatus::Finished, |job| {
            job.result = Some(result);
            job.result_ref = result_ref;
            job.progress_percent = Some(100);
            job.error = None;
        })?;
        self.evict_terminal(id)?;
        Ok(job)
    }

    pub fn fail(&self, id: Uuid, error: &JobError) -> Result<Job, JobError> {
        let reason = error.to_string();
        let job = self.transition_with(id, JobStatus::Failed, |job| {
            job.error = Some(reason);
        })?;
        self.evict_terminal(id)?;
        Ok(job)
    }

    /// Note that `id` ended and drop the oldest ended jobs beyond the cap.
    fn evict_terminal(&self, id: Uuid) -> Result<(), JobError> {
        let mut ended = self
            .ended
            .lock()
            .map_err(|e| JobError::Storage(format!("Lock poisoned: {}", e)))?;
        ended.push_back(id);
        if ended.len() <= self.retained {
            return Ok(());
        }

        let mut jobs = self.lock()?;
        let mut evicted = 0;
        while ended.len() > self.retained {
            if let Some(old) = ended.pop_front() {
                jobs.remove(&old);
                evicted += 1;
            }
        }
        debug!(evicted, retained = self.retained, "Dropped old terminal jobs");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediadex_core::DocumentJob;

    fn doc_kind(path: &str) -> JobKind {
        JobKind::Document(DocumentJob {
            path: PathBuf::from(path),
            doc_id: None,
        })
    }

    #[test]
    fn test_create_and_get() {
        let store = JobStore::new();
        let job = store.create(doc_kind("/tmp/a.txt")).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(store.get(job.id).unwrap().id, job.id);
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let store = JobStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.get(id), Err(JobError::NotFound(x)) if x == id));
    }

    #[test]
    fn test_invalid_transition_rejected() {
        let store = JobStore::new();
        let job = store.create(doc_kind("/tmp/a.txt")).unwrap();
        let err = store.update_status(job.id, JobStatus::Finished).unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition(JobStatus::Pending, JobStatus::Finished)));
        assert_eq!(store.get(job.id).unwrap().status, JobStatus::Pending);
    }

    #[test]
    fn test_ensure_status_is_idempotent() {
        let store = JobStore::new();
        let job = store.create(doc_kind("/tmp/a.txt")).unwrap();
        store.update_status(job.id, JobStatus::Submitted).unwrap();
        store.ensure_status(job.id, JobStatus::Polling).unwrap();
        store.ensure_status(job.id, JobStatus::Polling).unwrap();
        assert_eq!(store.get(job.id).unwrap().status, JobStatus::Polling);
    }

    #[test]
    fn test_finish_view() {
        let store = JobStore::new();
        let job = store.create(doc_kind("/tmp/a.txt")).unwrap();
        store.update_status(job.id, JobStatus::Submitted).unwrap();
        store.update_status(job.id, JobStatus::Generating).unwrap();
        store.finish(job.id, "a.txt".to_string(), None).unwrap();

        let view = store.status_view(job.id).unwrap();
        assert_eq!(view.state, TaskState::Success);
        assert_eq!(view.progress_percent, Some(100));
        assert_eq!(view.result.as_deref(), Some("a.txt"));
        assert_eq!(view.name, "a.txt");
    }

    #[test]
    fn test_fail_records_reason() {
        let store = JobStore::new();
        let job = store.create(doc_kind("/tmp/a.txt")).unwrap();
        store.fail(job.id, &JobError::Cancelled).unwrap();

        let view = store.status_view(job.id).unwrap();
        assert_eq!(view.state, TaskState::Failure);
        assert_eq!(view.error.as_deref(), Some("cancelled"));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["state"], "FAILURE");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_record_retry_counts() {
        let store = JobStore::new();
        let job = store.create(doc_kind("/tmp/a.txt")).unwrap();
        assert_eq!(store.record_retry(job.id).unwrap(), 1);
        assert_eq!(store.record_retry(job.id).unwrap(), 2);
    }

    #[test]
    fn test_terminal_jobs_beyond_retention_are_dropped() {
        let store = JobStore::with_retention(2);
        let running = store.create(doc_kind("/tmp/running.txt")).unwrap();
        let ids: Vec<Uuid> = (0..3)
            .map(|i| {
                let job = store.create(doc_kind(&format!("/tmp/{}.txt", i))).unwrap();
                store.fail(job.id, &JobError::Cancelled).unwrap();
                job.id
            })
            .collect();

        assert!(matches!(store.get(ids[0]), Err(JobError::NotFound(_))));
        assert!(store.get(ids[1]).is_ok());
        assert!(store.get(ids[2]).is_ok());
        // Jobs still in flight are never dropped.
        assert_eq!(store.get(running.id).unwrap().status, JobStatus::Pending);
        assert_eq!(store.list(None, None).len(), 3);
    }

    #[test]
    fn test_list_filters_by_status() {
        let store = JobStore::new();
        let a = store.create(doc_kind("/tmp/a.txt")).unwrap();
        store.create(doc_kind("/tmp/b.txt")).unwrap();
        store.fail(a.id, &JobError::Cancelled).unwrap();

        assert_eq!(store.list(None, None).len(), 2);
        assert_eq!(store.list(Some(JobStatus::Failed), None).len(), 1);
        assert_eq!(store.list(None, Some(1)).len(), 1);
    }
}
