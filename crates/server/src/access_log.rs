//! JSON access logging.
//!
//! One newline-delimited JSON object per completed request, appended to
//! the configured log file for the process lifetime. Error responses are
//! additionally mirrored to the operational log on stderr.

use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// One completed request.
#[derive(Debug, Serialize)]
pub struct AccessEntry {
    pub ts: String,
    pub method: String,
    pub url: String,
    pub status: u16,
    #[serde(rename = "latencyMs")]
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(rename = "keyId", skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

/// Append-only access log stream.
pub struct AccessLogger {
    out: Mutex<LineWriter<File>>,
}

impl AccessLogger {
    /// Open the log file for appending, creating it if absent.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            out: Mutex::new(LineWriter::new(file)),
        })
    }

    /// Write one entry. Failures are reported on the operational log; a
    /// full disk must not take request serving down with it.
    pub fn log(&self, entry: &AccessEntry) {
        if entry.status >= 400 {
            tracing::warn!(
                method = %entry.method,
                url = %entry.url,
                status = entry.status,
                latency_ms = entry.latency_ms,
                "request failed"
            );
        }

        let line = match serde_json::to_string(entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(error = %e, "access entry serialization failed");
                return;
            }
        };

        let mut out = match self.out.lock() {
            Ok(out) => out,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = writeln!(out, "{line}") {
            tracing::error!(error = %e, "access log write failed");
        }
    }
}
