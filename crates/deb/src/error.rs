//! Error types for deb parsing.

use thiserror::Error;

/// Deb parsing error type.
///
/// The first three variants are the validation failures surfaced to
/// uploaders; their display strings are part of the API contract.
#[derive(Debug, Error)]
pub enum DebError {
    #[error("Invalid ar archive")]
    InvalidArchive,

    #[error("Not a Debian package")]
    NotDebianPackage,

    #[error("Unsupported Debian package format")]
    UnsupportedFormat,

    #[error("control extraction failed: {0}")]
    ControlExtraction(String),
}

/// Result type alias for deb operations.
pub type Result<T> = std::result::Result<T, DebError>;
