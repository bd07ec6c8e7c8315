//! Debian binary package parsing.
//!
//! A `.deb` is an ar archive carrying `debian-binary`, a control tarball
//! and a data tarball. This crate validates the container, extracts the
//! control file when a decoder is available, and parses its RFC-822-style
//! fields into the typed record used by the rest of the system. For
//! control tarballs we cannot decode in-process (xz, zstd), extraction is
//! deferred to the `dpkg-deb` fallback, which runs against the artifact
//! after it has been written.

pub mod ar;
pub mod control;
pub mod error;
pub mod fallback;

pub use control::{ControlSummary, parse_control_text};
pub use error::{DebError, Result};
pub use fallback::extract_control_fallback;

use flate2::read::GzDecoder;
use std::io::Read;

/// Parse result for a complete `.deb` byte buffer.
#[derive(Clone, Debug)]
pub struct DebInfo {
    /// Contents of `debian-binary`, e.g. `2.0`.
    pub deb_version: String,
    /// Parsed control fields, absent when extraction was deferred.
    pub control: Option<ControlSummary>,
}

/// Validate a `.deb` and extract its control fields where possible.
///
/// Requires `debian-binary` (declaring format `2.x`), a `control.tar*`
/// member and a `data.tar*` member. A gzip or uncompressed control tarball
/// is decoded in-process; xz and zstd defer to the fallback extractor and
/// yield `control: None` here.
pub fn parse_deb(bytes: &[u8]) -> Result<DebInfo> {
    let members = ar::parse_ar(bytes)?;

    let deb_version = members
        .iter()
        .find(|m| m.name == "debian-binary")
        .map(|m| String::from_utf8_lossy(m.data).trim().to_string())
        .ok_or(DebError::NotDebianPackage)?;

    let control_member = members
        .iter()
        .find(|m| m.name == "control.tar" || m.name.starts_with("control.tar."))
        .ok_or(DebError::NotDebianPackage)?;

    if !members
        .iter()
        .any(|m| m.name == "data.tar" || m.name.starts_with("data.tar."))
    {
        return Err(DebError::NotDebianPackage);
    }

    if !deb_version.starts_with("2.") {
        return Err(DebError::UnsupportedFormat);
    }

    // Extraction failures are not validation failures: the package is
    // stored either way and the fallback extractor gets a second attempt
    // against the on-disk artifact.
    let control = match control_member.name.rsplit('.').next() {
        Some("tar") => read_control_tarball(control_member.data)
            .map_err(|e| tracing::debug!(error = %e, "control extraction deferred"))
            .ok(),
        Some("gz") => {
            let mut decoded = Vec::new();
            match GzDecoder::new(control_member.data).read_to_end(&mut decoded) {
                Ok(_) => read_control_tarball(&decoded)
                    .map_err(|e| tracing::debug!(error = %e, "control extraction deferred"))
                    .ok(),
                Err(e) => {
                    tracing::debug!(error = %e, "control extraction deferred");
                    None
                }
            }
        }
        // xz / zst: no in-process decoder, defer to dpkg-deb after the
        // artifact lands on disk.
        _ => None,
    };

    Ok(DebInfo {
        deb_version,
        control,
    })
}

/// Locate `control` (or `./control`) inside an uncompressed tarball and
/// parse its fields.
fn read_control_tarball(data: &[u8]) -> Result<ControlSummary> {
    let mut archive = tar::Archive::new(data);
    let entries = archive
        .entries()
        .map_err(|e| DebError::ControlExtraction(format!("control tarball: {e}")))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| DebError::ControlExtraction(format!("tar entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| DebError::ControlExtraction(format!("tar path: {e}")))?;
        let name = path.to_string_lossy();
        if name == "control" || name == "./control" {
            let mut text = String::new();
            entry
                .read_to_string(&mut text)
                .map_err(|e| DebError::ControlExtraction(format!("control read: {e}")))?;
            return Ok(ControlSummary::from_text(&text));
        }
    }

    Err(DebError::ControlExtraction(
        "control file missing from control tarball".to_string(),
    ))
}
