//! Persistent history of every mirror attempt
//!
//! One JSON object per line, appended to `history.log`. Each append holds an
//! exclusive advisory lock on the file so that concurrent rmirr processes
//! never interleave partial lines. Host and pid tell those writers apart.

use chrono::Utc;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// History entry
#[derive(Debug, Serialize)]
struct HistoryEvent<'a> {
    timestamp: String,
    host: &'a str,
    pid: u32,
    level: &'a str,
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
}

/// Append-only event trail
#[derive(Debug, Clone)]
pub struct History {
    path: PathBuf,
    host: String,
    pid: u32,
}

impl History {
    pub fn new(path: impl Into<PathBuf>, host: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            host: host.into(),
            pid: std::process::id(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, event: &str, message: &str) {
        self.record("INFO", event, Some(message));
    }

    pub fn warn(&self, event: &str, message: &str) {
        self.record("WARNING", event, Some(message));
    }

    pub fn error(&self, event: &str, message: &str) {
        self.record("ERROR", event, Some(message));
    }

    /// Record a bare event with no message
    pub fn mark(&self, event: &str) {
        self.record("INFO", event, None);
    }

    fn record(&self, level: &str, event: &str, message: Option<&str>) {
        let entry = HistoryEvent {
            timestamp: Utc::now().to_rfc3339(),
            host: &self.host,
            pid: self.pid,
            level,
            event,
            message,
        };

        log::debug!(target: "history", "{} {}", event, message.unwrap_or(""));

        // History is best effort; a failed write never fails a mirror
        if let Err(e) = self.append(&entry) {
            log::warn!("Failed to write history {}: {}", self.path.display(), e);
        }
    }

    fn append(&self, entry: &HistoryEvent<'_>) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        fs2::FileExt::lock_exclusive(&file)?;
        let written = file.write_all(line.as_bytes());
        fs2::FileExt::unlock(&file).ok();
        written?;

        Ok(())
    }
}
