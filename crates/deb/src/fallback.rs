//! Control extraction via `dpkg-deb`.
//!
//! Second-chance extractor for packages whose control tarball could not be
//! decoded in-process. Runs against the artifact already written to disk,
//! bounded so a wedged dpkg-deb cannot pin an upload or self-heal pass.

use crate::control::ControlSummary;
use crate::error::{DebError, Result};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

/// Upper bound on a single `dpkg-deb --field` invocation.
const FALLBACK_TIMEOUT: Duration = Duration::from_secs(15);

/// Extract control fields by shelling out to `dpkg-deb --field`.
pub async fn extract_control_fallback(path: &Path) -> Result<ControlSummary> {
    let output = tokio::time::timeout(
        FALLBACK_TIMEOUT,
        Command::new("dpkg-deb")
            .arg("--field")
            .arg(path)
            .kill_on_drop(true)
            .output(),
    )
    .await
    .map_err(|_| DebError::ControlExtraction("dpkg-deb timed out".to_string()))?
    .map_err(|e| DebError::ControlExtraction(format!("dpkg-deb spawn: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(DebError::ControlExtraction(format!(
            "dpkg-deb exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    Ok(ControlSummary::from_text(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_artifact_reports_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = extract_control_fallback(&dir.path().join("absent.deb")).await;
        assert!(matches!(result, Err(DebError::ControlExtraction(_))));
    }
}
