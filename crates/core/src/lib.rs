//! Core domain types and shared logic for Pository.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Package locations and their sanitized components
//! - Immutable package metadata and control-extracted fields
//! - Apt `Packages` / `Release` document rendering
//! - Configuration types
//! - Shared error type

pub mod aptfmt;
pub mod config;
pub mod error;
pub mod location;
pub mod metadata;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use location::{PackageLocation, sanitize_path};
pub use metadata::{ControlFields, PackageMetadata};

/// MIME type of every stored artifact.
pub const DEB_MIME: &str = "application/vnd.debian.binary-package";

/// Architecture tags recognized without falling back to the generic pattern.
pub const KNOWN_ARCHITECTURES: &[&str] = &[
    "all", "amd64", "arm64", "armel", "armhf", "i386", "mips64el", "mipsel", "ppc64el", "riscv64",
    "s390x",
];
