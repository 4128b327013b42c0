//! Bounded retry with fixed backoff.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::JobError;

/// Retry a fallible stage on transient errors.
///
/// The stage runs once, then up to `max_retries` more times, waiting
/// `backoff` between attempts. Any non-transient error ends the run at once.
/// Cancellation is checked before every attempt and during the backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Run `op`, passing it the zero-based attempt number.
    ///
    /// `on_retry` is called with the retry number (starting at 1) and the
    /// error that caused it, before the backoff.
    pub async fn run<T, F, Fut, R>(
        &self,
        cancel: &CancellationToken,
        mut on_retry: R,
        mut op: F,
    ) -> Result<T, JobError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, JobError>>,
        R: FnMut(u32, &JobError),
    {
        let mut attempt = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(JobError::Cancelled);
            }

            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() => e,
                Err(e) => return Err(e),
            };

            if attempt >= self.max_retries {
                return Err(JobError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: err.to_string(),
                });
            }

            attempt += 1;
            warn!(
                retry = attempt,
                max_retries = self.max_retries,
                error = %err,
                "Transient failure, retrying in {}s",
                self.backoff.as_secs()
            );
            on_retry(attempt, &err);

            tokio::select! {
                _ = tokio::time::sleep(self.backoff) => {}
                _ = cancel.cancelled() => return Err(JobError::Cancelled),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(10))
    }
}
