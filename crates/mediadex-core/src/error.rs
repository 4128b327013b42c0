use thiserror::Error;

/// Top-level error type for mediadex.
///
/// Subsystem crates define their own error enums and convert into this one
/// at the composition root, so the binary can report any failure uniformly.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MediadexError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Progress store error: {0}")]
    Progress(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Job error: {0}")]
    Job(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for MediadexError {
    fn from(err: toml::de::Error) -> Self {
        MediadexError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MediadexError {
    fn from(err: toml::ser::Error) -> Self {
        MediadexError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MediadexError {
    fn from(err: serde_json::Error) -> Self {
        MediadexError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for mediadex operations.
pub type Result<T> = std::result::Result<T, MediadexError>;
