//! mediadex API crate - the two axum routers.
//!
//! The index RPC router is the only way into the index service and sits
//! behind the shared secret. The app router is the job, progress, query and
//! summary surface used by the front-end.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_app_router, create_index_router, serve};
pub use state::{AppState, IndexRpcState};
