use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{MediadexError, Result};

/// Top-level configuration for mediadex.
///
/// Loaded from `~/.mediadex/config.toml` by default. Each section maps to one
/// component: the index service, the external gateway, the job pipeline, the
/// progress store and the HTTP front door.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediadexConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl MediadexConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MediadexConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| MediadexError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// The data directory with `~` expanded.
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.general.data_dir)
    }

    /// Resolve a possibly-relative path against the data directory.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let p = expand_home(path);
        if p.is_absolute() {
            p
        } else {
            self.data_dir().join(p)
        }
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root directory for the saved index, progress database and artifacts.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.mediadex/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Index service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Address the index RPC endpoint binds to.
    pub host: String,
    /// Port of the index RPC endpoint.
    pub port: u16,
    /// Shared secret required by every RPC caller. Empty means "load or
    /// generate `<data_dir>/index.secret`".
    pub secret: String,
    /// Directory the vector index is persisted to.
    pub persist_dir: String,
    /// Registry file (id -> preview), rewritten after every insert.
    pub registry_file: String,
    /// Number of source fragments consulted per query.
    pub top_k: usize,
    /// Registry preview length in characters.
    pub preview_chars: usize,
    /// Chunk size in characters used when splitting documents.
    pub chunk_size: usize,
    /// Embedding dimension.
    pub embedding_dim: usize,
    /// Upper bound on waiting for the exclusive gate. None waits forever.
    pub gate_timeout_secs: Option<u64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5002,
            secret: String::new(),
            persist_dir: "saved_index".to_string(),
            registry_file: "stored_documents.json".to_string(),
            top_k: 2,
            preview_chars: 200,
            chunk_size: 1024,
            embedding_dim: 384,
            gate_timeout_secs: None,
        }
    }
}

/// External indexing gateway (video indexer) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the gateway API.
    pub api_endpoint: String,
    /// Account location segment of every request path.
    pub location: String,
    /// Account identifier.
    pub account_id: String,
    /// Account access token passed as `accessToken`.
    pub access_token: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Privacy mode for uploaded media.
    pub privacy: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "https://api.videoindexer.ai".to_string(),
            location: "trial".to_string(),
            account_id: String::new(),
            access_token: String::new(),
            request_timeout_secs: 120,
            privacy: "Private".to_string(),
        }
    }
}

/// Job pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Seconds between gateway status polls.
    pub poll_interval_secs: u64,
    /// Overall poll timeout. None polls until a terminal state.
    pub poll_timeout_secs: Option<u64>,
    /// Retries of the poll/ingest stage after the first attempt.
    pub max_retries: u32,
    /// Fixed delay between retry attempts.
    pub retry_backoff_secs: u64,
    /// Seconds between prompt-content readiness checks.
    pub content_poll_interval_secs: u64,
    /// Overall prompt-content timeout. None waits until ready or cancelled.
    pub content_timeout_secs: Option<u64>,
    /// Prompt content style: "Full" or "Summarized".
    pub prompt_style: String,
    /// Jobs allowed to run at once.
    pub max_concurrent_jobs: usize,
    /// Directory generated artifacts are written to.
    pub artifact_dir: String,
    /// Finished or failed jobs kept for status lookups. Older ones are dropped.
    pub retained_jobs: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            poll_timeout_secs: None,
            max_retries: 3,
            retry_backoff_secs: 10,
            content_poll_interval_secs: 10,
            content_timeout_secs: Some(3600),
            prompt_style: "Full".to_string(),
            max_concurrent_jobs: 4,
            artifact_dir: "documents".to_string(),
            retained_jobs: 1000,
        }
    }
}

/// Progress store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// SQLite file shared by every process reading or writing progress.
    pub db_path: String,
    /// Reserved key prefix for video progress entries.
    pub namespace: String,
    /// Grace delay before an "Excluded" entry is deleted.
    pub exclude_delay_secs: u64,
    /// When set, the pipeline POSTs progress here instead of writing the
    /// store directly.
    pub status_endpoint: Option<String>,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            db_path: "progress.db".to_string(),
            namespace: "video:".to_string(),
            exclude_delay_secs: 5,
            status_endpoint: None,
        }
    }
}

/// Job/progress HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Front-end origin allowed by CORS.
    pub cors_origin: String,
    /// Where the index RPC endpoint lives.
    pub index_url: String,
    /// Local media and documents may only be submitted from here or from
    /// the artifact directory.
    pub upload_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            cors_origin: "http://localhost:5173".to_string(),
            index_url: "http://127.0.0.1:5002".to_string(),
            upload_dir: "uploads".to_string(),
        }
    }
}
