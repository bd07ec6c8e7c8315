//! Error types for authentication.

use thiserror::Error;

/// Authentication error type.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("key store corrupt: {0}")]
    StoreCorrupt(String),

    #[error("password hash error: {0}")]
    Hash(String),

    #[error("token rejected: {0}")]
    TokenRejected(String),

    #[error("jwks fetch failed: {0}")]
    JwksFetch(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;
