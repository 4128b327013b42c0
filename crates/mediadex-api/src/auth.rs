//! Shared-secret authentication for the index RPC server.
//!
//! Callers send `Authorization: Bearer <secret>`. The secret comes from
//! configuration or is generated once and kept in a file next to the data.

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rand::Rng;

use crate::state::IndexRpcState;

/// Generate a random 32-character hex secret.
pub fn generate_secret() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// Load the secret from file, or generate and save a new one.
pub fn load_or_generate_secret(secret_path: &std::path::Path) -> String {
    if let Ok(contents) = std::fs::read_to_string(secret_path) {
        let secret = contents.trim().to_string();
        if !secret.is_empty() {
            tracing::info!("Index secret loaded from {}", secret_path.display());
            return secret;
        }
    }

    let secret = generate_secret();

    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(secret_path, &secret) {
        tracing::warn!(error = %e, "Failed to save index secret to {}", secret_path.display());
    } else {
        // Owner-only: every process that can read it can write the index.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(secret_path, std::fs::Permissions::from_mode(0o600));
        }
        tracing::info!("Index secret saved to {}", secret_path.display());
    }

    secret
}

/// The configured secret if there is one, else the one kept at `secret_path`.
pub fn resolve_secret(configured: Option<&str>, secret_path: &std::path::Path) -> String {
    match configured.map(str::trim).filter(|s| !s.is_empty()) {
        Some(secret) => secret.to_string(),
        None => load_or_generate_secret(secret_path),
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": "unauthorized",
            "message": message
        })),
    )
        .into_response()
}

/// Middleware rejecting RPC calls without the shared secret.
pub async fn require_auth(
    State(state): State<IndexRpcState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(value) = req.headers().get("authorization") else {
        return unauthorized("Missing Authorization header");
    };
    let Ok(value) = value.to_str() else {
        return unauthorized("Invalid Authorization header encoding");
    };

    match value.strip_prefix("Bearer ") {
        Some(secret) if secret == &*state.secret => next.run(req).await,
        _ => {
            tracing::warn!("Rejected index call with a bad secret");
            unauthorized("Invalid shared secret")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_secret_is_hex() {
        let secret = generate_secret();
        assert_eq!(secret.len(), 32);
        assert!(secret.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(secret, generate_secret());
    }

    #[test]
    fn test_secret_is_persisted_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("index.secret");
        let first = load_or_generate_secret(&path);
        let second = load_or_generate_secret(&path);
        assert_eq!(first, second);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_configured_secret_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.secret");
        assert_eq!(resolve_secret(Some("password"), &path), "password");
        assert!(!path.exists());

        let generated = resolve_secret(Some("  "), &path);
        assert_eq!(generated.len(), 32);
    }
}
