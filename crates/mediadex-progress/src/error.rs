use mediadex_core::MediadexError;

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("Progress storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for ProgressError {
    fn from(err: rusqlite::Error) -> Self {
        ProgressError::Storage(err.to_string())
    }
}

impl From<ProgressError> for MediadexError {
    fn from(err: ProgressError) -> Self {
        MediadexError::Progress(err.to_string())
    }
}
