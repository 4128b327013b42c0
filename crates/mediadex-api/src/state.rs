//! State shared by the route handlers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::warn;

use mediadex_gateway::MediaGateway;
use mediadex_index::IndexApi;
use mediadex_jobs::JobRunner;
use mediadex_progress::ProgressStore;

/// State of the index RPC server.
#[derive(Clone)]
pub struct IndexRpcState {
    pub index: Arc<dyn IndexApi>,
    /// Bearer secret every RPC call must present.
    pub secret: Arc<str>,
    pub start_time: Instant,
}

impl IndexRpcState {
    pub fn new(index: Arc<dyn IndexApi>, secret: &str) -> Self {
        Self {
            index,
            secret: Arc::from(secret),
            start_time: Instant::now(),
        }
    }
}

/// State of the application server.
#[derive(Clone)]
pub struct AppState {
    /// Usually a remote client of the index RPC server.
    pub index: Arc<dyn IndexApi>,
    pub runner: Arc<JobRunner>,
    pub progress: Arc<ProgressStore>,
    pub gateway: Arc<dyn MediaGateway>,
    /// Front-end origin allowed by CORS.
    pub cors_origin: String,
    /// Canonical directories local files may be submitted from. Empty
    /// rejects every local path.
    pub upload_roots: Arc<[PathBuf]>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        index: Arc<dyn IndexApi>,
        runner: Arc<JobRunner>,
        progress: Arc<ProgressStore>,
        gateway: Arc<dyn MediaGateway>,
        cors_origin: &str,
    ) -> Self {
        Self {
            index,
            runner,
            progress,
            gateway,
            cors_origin: cors_origin.to_string(),
            upload_roots: Arc::from(Vec::new()),
            start_time: Instant::now(),
        }
    }

    /// Allow local submissions from `roots`. Roots that cannot be resolved
    /// are left out.
    pub fn with_upload_roots<I>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.upload_roots = roots
            .into_iter()
            .filter_map(|root| match std::fs::canonicalize(&root) {
                Ok(resolved) => Some(resolved),
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Upload root unavailable");
                    None
                }
            })
            .collect();
        self
    }
}
