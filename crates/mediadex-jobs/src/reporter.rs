//! Where the pipeline publishes progress.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use mediadex_core::ProgressUpdate;
use mediadex_progress::ProgressStore;

use crate::error::JobError;

#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, update: ProgressUpdate) -> Result<(), JobError>;
}

/// Writes straight into a progress board this process has open.
pub struct StoreReporter {
    store: Arc<ProgressStore>,
}

impl StoreReporter {
    pub fn new(store: Arc<ProgressStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProgressReporter for StoreReporter {
    async fn report(&self, update: ProgressUpdate) -> Result<(), JobError> {
        self.store
            .apply_update(&update)
            .map(|_| ())
            .map_err(|e| JobError::Report(e.to_string()))
    }
}

/// POSTs updates to a status-ingestion endpoint.
pub struct HttpReporter {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpReporter {
    pub fn new(endpoint: &str) -> Result<Self, JobError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| JobError::Report(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

#[async_trait]
impl ProgressReporter for HttpReporter {
    async fn report(&self, update: ProgressUpdate) -> Result<(), JobError> {
        self.client
            .post(&self.endpoint)
            .json(&update)
            .send()
            .await
            .and_then(|resp| resp.error_for_status())
            .map_err(|e| JobError::Report(e.to_string()))?;
        Ok(())
    }
}
