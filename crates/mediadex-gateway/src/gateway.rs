//! The gateway contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mediadex_core::VideoJob;

use crate::error::GatewayError;
use crate::summary::SummaryRequest;

pub const STATE_PROCESSED: &str = "Processed";
pub const STATE_FAILED: &str = "Failed";

/// One observation of a submitted video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStatus {
    /// Remote processing state, e.g. `Uploaded`, `Processing`, `Processed`.
    pub state: String,
    /// Remote progress label, e.g. `"45%"`.
    pub progress: String,
}

impl GatewayStatus {
    pub fn new(state: impl Into<String>, progress: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            progress: progress.into(),
        }
    }

    pub fn is_processed(&self) -> bool {
        self.state == STATE_PROCESSED
    }

    pub fn is_failed(&self) -> bool {
        self.state == STATE_FAILED
    }

    pub fn is_terminal(&self) -> bool {
        self.is_processed() || self.is_failed()
    }
}

/// A remote service that turns media into indexable content.
#[async_trait]
pub trait MediaGateway: Send + Sync {
    /// Start remote processing. Returns the remote video id.
    async fn submit(&self, job: &VideoJob) -> Result<String, GatewayError>;

    /// Current processing state of `video_id`.
    async fn poll(&self, video_id: &str, language: &str) -> Result<GatewayStatus, GatewayError>;

    /// The generated content for a processed video, waiting for it if needed.
    /// Callers stop the wait by dropping the future.
    async fn fetch_content(&self, video_id: &str) -> Result<serde_json::Value, GatewayError>;

    async fn list_videos(&self) -> Result<serde_json::Value, GatewayError>;

    async fn create_summary(
        &self,
        video_id: &str,
        request: &SummaryRequest,
    ) -> Result<serde_json::Value, GatewayError>;

    /// All textual summaries of a video, or one when `summary_id` is given.
    async fn list_summaries(
        &self,
        video_id: &str,
        summary_id: Option<&str>,
    ) -> Result<serde_json::Value, GatewayError>;
}
