//! Error types for notarium

use thiserror::Error;

/// Result type alias using NotariumError
pub type Result<T> = std::result::Result<T, NotariumError>;

/// Main error type for notarium
#[derive(Debug, Error)]
pub enum NotariumError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Malformed frontmatter in {path}: {reason}")]
    MalformedFrontmatter { path: String, reason: String },

    #[error("Embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Vector store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Chat backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Chat backend returned a bad response: {0}")]
    BackendResponse(String),

    #[error("Note not found: {0}")]
    NoteNotFound(String),

    #[error("Chat session is closed")]
    SessionClosed,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_yaml::Error> for NotariumError {
    fn from(e: serde_yaml::Error) -> Self {
        NotariumError::Config(e.to_string())
    }
}
