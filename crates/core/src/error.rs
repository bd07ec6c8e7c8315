//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid package name: {0}")]
    InvalidName(String),

    #[error("invalid package version: {0}")]
    InvalidVersion(String),

    #[error("invalid architecture: {0}")]
    InvalidArchitecture(String),

    #[error("empty {0} component")]
    EmptyComponent(&'static str),

    #[error("invalid deb filename: {0}")]
    InvalidFilename(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
