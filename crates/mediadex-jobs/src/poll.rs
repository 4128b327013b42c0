//! The wait loop that drives one submitted video to a terminal state.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use mediadex_core::MediadexConfig;
use mediadex_gateway::{GatewayStatus, MediaGateway};

use crate::error::JobError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Overall limit on the wait. `None` waits until a terminal state.
    pub timeout: Option<Duration>,
}

impl PollSettings {
    pub fn from_config(config: &MediadexConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.jobs.poll_interval_secs),
            timeout: config.jobs.poll_timeout_secs.map(Duration::from_secs),
        }
    }

    /// When a wait starting now has to give up.
    pub fn deadline_from_now(&self) -> Option<Instant> {
        self.timeout.map(|limit| Instant::now() + limit)
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Processed(GatewayStatus),
    Failed(GatewayStatus),
    /// The deadline passed; carries the last observed status.
    TimedOut(GatewayStatus),
}

/// Poll `video_id` every `interval` until it is processed or failed.
///
/// Every observation is handed to `on_status` before the state is checked.
/// The deadline is checked once per iteration, after the poll, so an
/// in-flight request is never interrupted by it. It belongs to the job, not
/// to this call: a retried wait keeps the deadline of the first one. Poll
/// errors are returned unchanged for the caller's retry policy to judge.
pub async fn wait_for_processing<F, Fut>(
    gateway: &dyn MediaGateway,
    video_id: &str,
    language: &str,
    interval: Duration,
    deadline: Option<Instant>,
    cancel: &CancellationToken,
    mut on_status: F,
) -> Result<PollOutcome, JobError>
where
    F: FnMut(GatewayStatus) -> Fut,
    Fut: Future<Output = ()>,
{
    loop {
        if cancel.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        let status = gateway.poll(video_id, language).await?;
        on_status(status.clone()).await;

        if status.is_processed() {
            info!(video_id = %video_id, "Video processed");
            return Ok(PollOutcome::Processed(status));
        }
        if status.is_failed() {
            info!(video_id = %video_id, progress = %status.progress, "Video processing failed");
            return Ok(PollOutcome::Failed(status));
        }

        if deadline.is_some_and(|at| Instant::now() >= at) {
            info!(video_id = %video_id, state = %status.state, "Gave up waiting, deadline passed");
            return Ok(PollOutcome::TimedOut(status));
        }

        debug!(video_id = %video_id, state = %status.state, progress = %status.progress, "Still processing");
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => return Err(JobError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mediadex_core::VideoJob;
    use mediadex_gateway::{GatewayError, SummaryRequest};

    /// Plays back scripted poll results, then repeats `fallback`.
    struct Scripted {
        script: Mutex<VecDeque<Result<GatewayStatus, GatewayError>>>,
        fallback: GatewayStatus,
        polls: AtomicU32,
    }

    impl Scripted {
        fn new(
            script: Vec<Result<GatewayStatus, GatewayError>>,
            fallback: GatewayStatus,
        ) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                polls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl MediaGateway for Scripted {
        async fn submit(&self, _job: &VideoJob) -> Result<String, GatewayError> {
            Ok("vid".to_string())
        }

        async fn poll(&self, _id: &str, _language: &str) -> Result<GatewayStatus, GatewayError> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Ok(self.fallback.clone()))
        }

        async fn fetch_content(&self, _id: &str) -> Result<serde_json::Value, GatewayError> {
            Ok(serde_json::Value::Null)
        }

        async fn list_videos(&self) -> Result<serde_json::Value, GatewayError> {
            Ok(serde_json::Value::Null)
        }

        async fn create_summary(
            &self,
            _id: &str,
            _request: &SummaryRequest,
        ) -> Result<serde_json::Value, GatewayError> {
            Ok(serde_json::Value::Null)
        }

        async fn list_summaries(
            &self,
            _id: &str,
            _summary_id: Option<&str>,
        ) -> Result<serde_json::Value, GatewayError> {
            Ok(serde_json::Value::Null)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_each_observation_until_processed() {
        let gateway = Scripted::new(
            vec![
                Ok(GatewayStatus::new("Uploaded", "0%")),
                Ok(GatewayStatus::new("Processing", "50%")),
            ],
            GatewayStatus::new("Processed", "100%"),
        );
        let seen = Mutex::new(Vec::new());

        let outcome = wait_for_processing(
            &gateway,
            "vid",
            "auto",
            PollSettings::default().interval,
            None,
            &CancellationToken::new(),
            |status| {
                seen.lock().unwrap().push(status.progress);
                async {}
            },
        )
        .await
        .unwrap();

        assert!(matches!(outcome, PollOutcome::Processed(_)));
        assert_eq!(*seen.lock().unwrap(), vec!["0%", "50%", "100%"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_state_stops_polling() {
        let gateway = Scripted::new(vec![], GatewayStatus::new("Failed", "20%"));
        let outcome = wait_for_processing(
            &gateway,
            "vid",
            "auto",
            PollSettings::default().interval,
            None,
            &CancellationToken::new(),
            |_| async {},
        )
        .await
        .unwrap();
        assert_eq!(outcome, PollOutcome::Failed(GatewayStatus::new("Failed", "20%")));
        assert_eq!(gateway.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_surfaces_last_state() {
        let gateway = Scripted::new(vec![], GatewayStatus::new("Processing", "10%"));
        let settings = PollSettings {
            interval: Duration::from_secs(5),
            timeout: Some(Duration::from_secs(12)),
        };
        let started = Instant::now();

        let outcome = wait_for_processing(
            &gateway,
            "vid",
            "auto",
            settings.interval,
            settings.deadline_from_now(),
            &CancellationToken::new(),
            |_| async {},
        )
        .await
        .unwrap();

        assert_eq!(
            outcome,
            PollOutcome::TimedOut(GatewayStatus::new("Processing", "10%"))
        );
        assert!(started.elapsed() >= Duration::from_secs(12));
        // Polls at 0s, 5s, 10s and 15s.
        assert_eq!(gateway.polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_passed_deadline_stops_after_one_poll() {
        let gateway = Scripted::new(vec![], GatewayStatus::new("Processing", "40%"));
        let deadline = Instant::now() + Duration::from_secs(3);
        tokio::time::sleep(Duration::from_secs(4)).await;

        let outcome = wait_for_processing(
            &gateway,
            "vid",
            "auto",
            Duration::from_secs(5),
            Some(deadline),
            &CancellationToken::new(),
            |_| async {},
        )
        .await
        .unwrap();

        assert!(matches!(outcome, PollOutcome::TimedOut(_)));
        assert_eq!(gateway.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_error_is_returned() {
        let gateway = Scripted::new(
            vec![Err(GatewayError::Transient("connection reset".to_string()))],
            GatewayStatus::new("Processed", "100%"),
        );
        let err = wait_for_processing(
            &gateway,
            "vid",
            "auto",
            PollSettings::default().interval,
            None,
            &CancellationToken::new(),
            |_| async {},
        )
        .await
        .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_waiting() {
        let gateway = Scripted::new(vec![], GatewayStatus::new("Processing", "10%"));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            trigger.cancel();
        });

        let err = wait_for_processing(
            &gateway,
            "vid",
            "auto",
            PollSettings::default().interval,
            None,
            &cancel,
            |_| async {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, JobError::Cancelled));
        assert_eq!(gateway.polls.load(Ordering::SeqCst), 2);
    }
}
