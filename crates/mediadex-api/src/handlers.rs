//! Route handler functions for both routers.
//!
//! Handlers only translate between HTTP and the component contracts; all
//! behavior lives in the index, jobs, progress and gateway crates.

use std::collections::BTreeMap;
use std::path::{Path as FsPath, PathBuf};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use mediadex_core::{DocumentJob, IndexedDocument, JobKind, ProgressUpdate, VideoJob};
use mediadex_gateway::SummaryRequest;
use mediadex_index::{Answer, InsertRequest, InsertResponse, QueryRequest};
use mediadex_jobs::JobStatusView;

use crate::error::ApiError;
use crate::state::{AppState, IndexRpcState};

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SummaryParams {
    pub summary_id: Option<String>,
}

/// Body of POST /videos/{id}/summaries. Missing fields take their defaults.
#[derive(Debug, Default, Deserialize)]
pub struct SummaryBody {
    pub model: Option<String>,
    pub length: Option<String>,
    pub style: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JobAccepted {
    pub job_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelResponse {
    pub job_id: Uuid,
    pub cancelled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

fn health_response(start_time: std::time::Instant) -> HealthResponse {
    HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: start_time.elapsed().as_secs(),
    }
}

// =============================================================================
// Index RPC
// =============================================================================

/// GET /health on the index server.
pub async fn index_health(State(state): State<IndexRpcState>) -> Json<HealthResponse> {
    Json(health_response(state.start_time))
}

/// POST /rpc/query
pub async fn rpc_query(
    State(state): State<IndexRpcState>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<Answer>, ApiError> {
    Ok(Json(state.index.query(&body.text).await?))
}

/// POST /rpc/insert - the path is read by the index server itself.
pub async fn rpc_insert(
    State(state): State<IndexRpcState>,
    Json(body): Json<InsertRequest>,
) -> Result<Json<InsertResponse>, ApiError> {
    let id = state.index.insert(&body.path, body.doc_id).await?;
    Ok(Json(InsertResponse { id }))
}

/// GET /rpc/documents
pub async fn rpc_documents(
    State(state): State<IndexRpcState>,
) -> Result<Json<Vec<IndexedDocument>>, ApiError> {
    Ok(Json(state.index.list().await?))
}

// =============================================================================
// Application
// =============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health_response(state.start_time))
}

/// GET /query?text=...
pub async fn query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<Answer>, ApiError> {
    let text = params
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            ApiError::BadRequest(
                "No text found, please include a ?text=blah parameter in the URL".to_string(),
            )
        })?;
    Ok(Json(state.index.query(&text).await?))
}

/// GET /documents
pub async fn documents(
    State(state): State<AppState>,
) -> Result<Json<Vec<IndexedDocument>>, ApiError> {
    Ok(Json(state.index.list().await?))
}

/// POST /jobs/video
pub async fn submit_video(
    State(state): State<AppState>,
    Json(mut job): Json<VideoJob>,
) -> Result<(StatusCode, Json<JobAccepted>), ApiError> {
    if !job.is_url() && !job.media_path.trim().is_empty() {
        let local = confine_to_uploads(&state, FsPath::new(&job.media_path)).await?;
        job.media_path = local.to_string_lossy().to_string();
    }
    let job_id = state.runner.submit(JobKind::Video(job))?;
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id })))
}

/// POST /jobs/document
pub async fn submit_document(
    State(state): State<AppState>,
    Json(mut job): Json<DocumentJob>,
) -> Result<(StatusCode, Json<JobAccepted>), ApiError> {
    if !job.path.as_os_str().is_empty() {
        job.path = confine_to_uploads(&state, &job.path).await?;
    }
    let job_id = state.runner.submit(JobKind::Document(job))?;
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id })))
}

/// Resolve `path` and require it to sit under one of the upload roots.
/// The resolved path is what the job gets, so links are followed once.
async fn confine_to_uploads(state: &AppState, path: &FsPath) -> Result<PathBuf, ApiError> {
    let resolved = tokio::fs::canonicalize(path)
        .await
        .map_err(|_| ApiError::BadRequest(format!("{} is not a readable file", path.display())))?;
    if state
        .upload_roots
        .iter()
        .any(|root| resolved.starts_with(root))
    {
        return Ok(resolved);
    }
    warn!(path = %path.display(), "Rejected submission outside the upload directories");
    Err(ApiError::BadRequest(format!(
        "{} is outside the upload directories",
        path.display()
    )))
}

/// GET /jobs/{id}
pub async fn job_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusView>, ApiError> {
    Ok(Json(state.runner.status(id)?))
}

/// POST /jobs/{id}/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelResponse>, ApiError> {
    let cancelled = state.runner.cancel(id)?;
    Ok(Json(CancelResponse { job_id: id, cancelled }))
}

/// POST /progress - progress ingestion from job workers.
pub async fn push_progress(
    State(state): State<AppState>,
    Json(update): Json<ProgressUpdate>,
) -> Result<Json<ProgressUpdate>, ApiError> {
    if update.video_name.trim().is_empty() {
        return Err(ApiError::BadRequest("'video_name' must not be empty".to_string()));
    }
    // The delete task runs on its own; the handle is not awaited.
    let _ = state.progress.apply_update(&update)?;
    Ok(Json(update))
}

/// GET /progress - every entry under the video namespace.
pub async fn progress(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, String>>, ApiError> {
    Ok(Json(state.progress.get_all()?))
}

/// GET /videos
pub async fn videos(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.gateway.list_videos().await?))
}

/// POST /videos/{id}/summaries
pub async fn create_summary(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Json(body): Json<SummaryBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = SummaryRequest::parse(
        body.model.as_deref(),
        body.length.as_deref(),
        body.style.as_deref(),
    )
    .inspect_err(|e| warn!(video_id = %video_id, error = %e, "Rejected summary request"))?;
    Ok(Json(state.gateway.create_summary(&video_id, &request).await?))
}

/// GET /videos/{id}/summaries[?summary_id=...]
pub async fn list_summaries(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Query(params): Query<SummaryParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(
        state
            .gateway
            .list_summaries(&video_id, params.summary_id.as_deref())
            .await?,
    ))
}
