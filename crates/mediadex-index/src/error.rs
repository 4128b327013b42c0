//! Index error kinds.

use mediadex_core::MediadexError;

/// Errors surfaced by the index service and its RPC client.
///
/// The service never retries on its own; callers decide.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// The query could not be answered (empty index, embedding backend down).
    #[error("Query failed: {0}")]
    Query(String),
    /// The persisted index could not be loaded.
    #[error("Index load failed: {0}")]
    Load(String),
    /// The service is unreachable or the gate could not be acquired in time.
    #[error("Index unavailable: {0}")]
    Unavailable(String),
    /// The document to insert could not be read or is empty.
    #[error("Document error: {0}")]
    Document(String),
    /// The mutation could not be made durable and was rolled back.
    #[error("Persist failed: {0}")]
    Persist(String),
    /// The caller did not present the shared secret.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl IndexError {
    /// Machine-readable code used on the RPC wire.
    pub fn code(&self) -> &'static str {
        match self {
            IndexError::Query(_) => "query_error",
            IndexError::Load(_) => "load_error",
            IndexError::Unavailable(_) => "index_unavailable",
            IndexError::Document(_) => "document_error",
            IndexError::Persist(_) => "persist_error",
            IndexError::Unauthorized(_) => "unauthorized",
            IndexError::Storage(_) => "storage_error",
        }
    }

    /// Rebuild an error from its wire code and message.
    pub fn from_code(code: &str, message: String) -> Self {
        match code {
            "query_error" => IndexError::Query(message),
            "load_error" => IndexError::Load(message),
            "index_unavailable" => IndexError::Unavailable(message),
            "document_error" => IndexError::Document(message),
            "persist_error" => IndexError::Persist(message),
            "unauthorized" => IndexError::Unauthorized(message),
            _ => IndexError::Storage(message),
        }
    }
}

impl From<IndexError> for MediadexError {
    fn from(err: IndexError) -> Self {
        MediadexError::Index(err.to_string())
    }
}
