//! Error types for the storage engine.

use thiserror::Error;

/// Storage engine error type.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsafe path component: {0}")]
    UnsafePath(String),

    #[error("index corrupt for repo {repo}: {source}")]
    IndexCorrupt {
        repo: String,
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
