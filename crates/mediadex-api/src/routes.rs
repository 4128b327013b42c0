//! Router setup for the index RPC server and the application server.

use std::future::Future;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use mediadex_core::MediadexError;

use crate::handlers;
use crate::state::{AppState, IndexRpcState};

/// Index RPC router. Everything except `/health` requires the shared secret.
pub fn create_index_router(state: IndexRpcState) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::index_health));

    let protected_routes = Router::new()
        .route("/rpc/query", post(handlers::rpc_query))
        .route("/rpc/insert", post(handlers::rpc_insert))
        .route("/rpc/documents", get(handlers::rpc_documents))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::auth::require_auth,
        ));

    public_routes
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Application router: queries, jobs, progress and summaries.
pub fn create_app_router(state: AppState) -> Router {
    let origin = match state.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => AllowOrigin::exact(origin),
        Err(_) => {
            warn!(origin = %state.cors_origin, "Invalid CORS origin; cross-origin requests disabled");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/query", get(handlers::query))
        .route("/documents", get(handlers::documents))
        .route("/jobs/video", post(handlers::submit_video))
        .route("/jobs/document", post(handlers::submit_document))
        .route("/jobs/{id}", get(handlers::job_status))
        .route("/jobs/{id}/cancel", post(handlers::cancel_job))
        .route(
            "/progress",
            get(handlers::progress).post(handlers::push_progress),
        )
        .route("/videos", get(handlers::videos))
        .route(
            "/videos/{id}/summaries",
            get(handlers::list_summaries).post(handlers::create_summary),
        )
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve `router` until `shutdown` resolves.
pub async fn serve<F>(addr: &str, router: Router, shutdown: F) -> Result<(), MediadexError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MediadexError::Api(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| MediadexError::Api(format!("Server error: {}", e)))?;

    Ok(())
}
