use mediadex_core::MediadexError;

use crate::summary::ValidationError;

/// Errors from the media gateway.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The media could not be submitted (bad input or rejected request).
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Network or timeout class failure; worth retrying.
    #[error("Transient gateway error: {0}")]
    Transient(String),

    /// The remote service reported that processing failed.
    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Gateway returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Unexpected gateway response: {0}")]
    Decode(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl GatewayError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transient(_))
    }

    /// Classify a non-success HTTP status.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = if body.is_empty() {
            status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_string()
        } else {
            body.chars().take(500).collect()
        };

        match status.as_u16() {
            408 | 429 | 500 | 502 | 503 | 504 => {
                GatewayError::Transient(format!("{}: {}", status, message))
            }
            code => GatewayError::Http {
                status: code,
                message,
            },
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GatewayError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            GatewayError::from_status(status, "")
        } else {
            GatewayError::Transient(err.to_string())
        }
    }
}

impl From<GatewayError> for MediadexError {
    fn from(err: GatewayError) -> Self {
        MediadexError::Gateway(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_classification() {
        assert!(GatewayError::from_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(GatewayError::from_status(StatusCode::GATEWAY_TIMEOUT, "slow").is_transient());
        assert!(GatewayError::from_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());

        let err = GatewayError::from_status(StatusCode::BAD_REQUEST, "bad name");
        assert_eq!(
            err,
            GatewayError::Http {
                status: 400,
                message: "bad name".to_string()
            }
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_validation_is_not_transient() {
        let err: GatewayError = ValidationError::Length("Huge".to_string()).into();
        assert!(!err.is_transient());
        assert!(err.to_string().contains("Huge"));
    }
}
