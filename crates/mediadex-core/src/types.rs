use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Index
// =============================================================================

/// A document known to the index registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Caller- or system-assigned identifier.
    pub id: String,
    /// Leading characters of the document text.
    pub text_preview: String,
    /// Where the document was loaded from.
    pub source_path: String,
}

// =============================================================================
// Jobs
// =============================================================================

/// Lifecycle of a job owned by the pipeline.
///
/// Success path: Pending -> Submitted -> Polling -> Generating -> Finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Submitted,
    Polling,
    Generating,
    Finished,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Submitted => write!(f, "submitted"),
            JobStatus::Polling => write!(f, "polling"),
            JobStatus::Generating => write!(f, "generating"),
            JobStatus::Finished => write!(f, "finished"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "submitted" => Ok(JobStatus::Submitted),
            "polling" => Ok(JobStatus::Polling),
            "generating" => Ok(JobStatus::Generating),
            "finished" => Ok(JobStatus::Finished),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// Coarse state reported by the job-status interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Pending,
    Progress,
    Success,
    Failure,
}

impl From<JobStatus> for TaskState {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Pending => TaskState::Pending,
            JobStatus::Submitted | JobStatus::Polling | JobStatus::Generating => {
                TaskState::Progress
            }
            JobStatus::Finished => TaskState::Success,
            JobStatus::Failed => TaskState::Failure,
        }
    }
}

/// A media file to be indexed by the external gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoJob {
    /// Human-readable name; also the progress key.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub partition: String,
    /// Local path or http(s) URL of the media.
    pub media_path: String,
}

fn default_language() -> String {
    "auto".to_string()
}

impl VideoJob {
    /// Path of the generated content artifact: `<artifact_dir>/<stem>_Video.json`.
    pub fn artifact_path(&self, artifact_dir: &Path) -> PathBuf {
        let stem = Path::new(&self.media_path)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty() && !self.is_url())
            .unwrap_or_else(|| self.name.clone());
        artifact_dir.join(format!("{}_Video.json", stem))
    }

    pub fn is_url(&self) -> bool {
        self.media_path.starts_with("http://") || self.media_path.starts_with("https://")
    }
}

/// A local document inserted into the index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentJob {
    pub path: PathBuf,
    #[serde(default)]
    pub doc_id: Option<String>,
}

/// What a job does, with the fields each kind needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    Document(DocumentJob),
    Video(VideoJob),
}

impl JobKind {
    /// Reference to the job input (path or URL).
    pub fn input_ref(&self) -> String {
        match self {
            JobKind::Document(doc) => doc.path.display().to_string(),
            JobKind::Video(video) => video.media_path.clone(),
        }
    }

    /// Name used for logging and progress keys.
    pub fn display_name(&self) -> String {
        match self {
            JobKind::Document(doc) => doc
                .path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| doc.path.display().to_string()),
            JobKind::Video(video) => video.name.clone(),
        }
    }
}

/// A unit of work executed by one pipeline worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: JobKind,
    pub status: JobStatus,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Last progress reported by the gateway, 0-100.
    pub progress_percent: Option<u8>,
    /// Token issued by the gateway on submission.
    pub external_token: Option<String>,
    /// Artifact written for this job, if any.
    pub result_ref: Option<PathBuf>,
    /// Human-readable outcome on success.
    pub result: Option<String>,
    /// Human-readable failure reason.
    pub error: Option<String>,
}

impl Job {
    pub fn new(kind: JobKind) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            status: JobStatus::Pending,
            retry_count: 0,
            created_at: now,
            updated_at: now,
            progress_percent: None,
            external_token: None,
            result_ref: None,
            result: None,
            error: None,
        }
    }
}

// =============================================================================
// Progress
// =============================================================================

/// Progress label that schedules deletion of the entry.
pub const PROGRESS_EXCLUDED: &str = "Excluded";
/// Progress label published when a job completes.
pub const PROGRESS_FINISHED: &str = "Finished";
/// Progress label published when a job fails.
pub const PROGRESS_FAILED: &str = "Failed";

/// A status update pushed to the progress-ingestion endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub video_name: String,
    pub progress: String,
    /// External job token, present on the Finished update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
}

impl ProgressUpdate {
    pub fn new(video_name: impl Into<String>, progress: impl Into<String>) -> Self {
        Self {
            video_name: video_name.into(),
            progress: progress.into(),
            video_id: None,
        }
    }

    pub fn with_video_id(mut self, video_id: impl Into<String>) -> Self {
        self.video_id = Some(video_id.into());
        self
    }

    pub fn is_excluded(&self) -> bool {
        self.progress == PROGRESS_EXCLUDED
    }
}

/// Parse a gateway progress string such as `"45%"` into a percentage.
pub fn parse_percent(progress: &str) -> Option<u8> {
    let digits: String = progress
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<u32>().ok().map(|p| p.min(100) as u8)
}
