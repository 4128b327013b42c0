//! mediadex index crate - the single-writer search index.
//!
//! The [`IndexStore`] owns the vector index and the document registry and
//! knows nothing about concurrency. [`IndexService`] wraps it behind one
//! exclusive gate and implements the [`IndexApi`] contract that every other
//! component depends on. [`RemoteIndex`] implements the same contract over
//! the authenticated RPC endpoint.

pub mod api;
pub mod chunk;
pub mod client;
pub mod embedding;
pub mod error;
pub mod service;
pub mod store;

pub use api::{Answer, IndexApi, InsertRequest, InsertResponse, QueryRequest, SourceFragment};
pub use client::RemoteIndex;
pub use embedding::{EmbeddingService, HashingEmbedding};
pub use error::IndexError;
pub use service::{IndexService, IndexSettings};
pub use store::{EmbedderInfo, IndexStore, PersistBatch};
