//! API error types and JSON error response formatting.
//!
//! Every failure is rendered as `{"error": <code>, "message": <text>}`.
//! Index errors keep their own wire code so the RPC client can rebuild them.
//! Server-side failures are logged in full and answered with a generic
//! message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use mediadex_gateway::{GatewayError, ValidationError};
use mediadex_index::IndexError;
use mediadex_jobs::JobError;
use mediadex_progress::ProgressError;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// JSON error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g., "bad_request", "query_error").
    pub error: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400 - missing or invalid parameters.
    BadRequest(String),
    /// 404 - unknown job or remote resource.
    NotFound(String),
    /// 500 - unexpected server error.
    Internal(String),
    /// 502 - the external gateway misbehaved.
    BadGateway(String),
    /// 503 - a collaborator is unreachable.
    ServiceUnavailable(String),
    /// An index failure, rendered with the index wire code.
    Index(IndexError),
}

impl ApiError {
    fn parts(self) -> (StatusCode, String, String) {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request".into(), msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found".into(), msg),
            ApiError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error".into(),
                    INTERNAL_MESSAGE.into(),
                )
            }
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, "bad_gateway".into(), msg),
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable".into(),
                msg,
            ),
            ApiError::Index(err) => {
                let code = err.code().to_string();
                match err {
                    IndexError::Query(msg) | IndexError::Document(msg) => {
                        (StatusCode::BAD_REQUEST, code, msg)
                    }
                    IndexError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, code, msg),
                    IndexError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, code, msg),
                    IndexError::Load(msg) | IndexError::Persist(msg) | IndexError::Storage(msg) => {
                        error!(code = %code, error = %msg, "Index request failed");
                        (StatusCode::INTERNAL_SERVER_ERROR, code, INTERNAL_MESSAGE.into())
                    }
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = self.parts();
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

impl From<IndexError> for ApiError {
    fn from(err: IndexError) -> Self {
        ApiError::Index(err)
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound(id) => ApiError::NotFound(format!("Job not found: {}", id)),
            JobError::Validation(msg) => ApiError::BadRequest(msg),
            JobError::Index(e) => ApiError::Index(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Validation(e) => e.into(),
            GatewayError::Transient(msg) => ApiError::ServiceUnavailable(msg),
            GatewayError::Http { status: 404, message } => ApiError::NotFound(message),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ProgressError> for ApiError {
    fn from(err: ProgressError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
