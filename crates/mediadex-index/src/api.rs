//! The contract every index consumer depends on, plus its wire types.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use mediadex_core::IndexedDocument;

use crate::error::IndexError;

/// Operations offered by the index, in-process or over RPC.
#[async_trait]
pub trait IndexApi: Send + Sync {
    /// Answer `text` from the top-k most similar fragments.
    async fn query(&self, text: &str) -> Result<Answer, IndexError>;

    /// Index the document at `path` and return the id it was stored under.
    ///
    /// When this returns `Ok` the document is already durable.
    async fn insert(&self, path: &Path, doc_id: Option<String>) -> Result<String, IndexError>;

    /// Snapshot of the document registry.
    async fn list(&self) -> Result<Vec<IndexedDocument>, IndexError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertRequest {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertResponse {
    pub id: String,
}

/// A query answer with the fragments it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<SourceFragment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceFragment {
    pub doc_id: String,
    pub text: String,
    /// Cosine similarity, rounded to two decimals.
    pub similarity: f64,
    pub start: usize,
    pub end: usize,
}
