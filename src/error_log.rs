// Restore error log
// Collects per-item failures during one restore and writes them out once at the end.

use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Default file name of the written log.
pub const ERROR_LOG_FILE_NAME: &str = "tsundoku_restore_error.txt";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// One recorded failure.
#[derive(Debug, Clone)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl ErrorEntry {
    /// Render as a log line, without the trailing newline.
    pub fn to_line(&self) -> String {
        format!("[{}] {}", self.timestamp.format(TIMESTAMP_FORMAT), self.message)
    }
}

/// Append-only sink shared by every phase of one restore.
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: Mutex<Vec<ErrorEntry>>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, message: impl Into<String>) {
        let entry = ErrorEntry {
            timestamp: Local::now(),
            message: message.into(),
        };
        tracing::warn!(message = %entry.message, "restore error recorded");
        // A poisoned lock still holds valid entries.
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the entries recorded so far.
    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Write every entry to a fresh `file_name` under `dir`.
    ///
    /// Returns `None` when there is nothing to write or the write failed;
    /// a failing log must never change the outcome of the restore itself.
    pub fn write_to(&self, dir: &Path, file_name: &str) -> Option<PathBuf> {
        let entries = self.entries();
        if entries.is_empty() {
            return None;
        }

        let path = dir.join(file_name);
        match write_entries(&path, &entries) {
            Ok(()) => Some(path),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to write restore error log"
                );
                None
            }
        }
    }
}

fn write_entries(path: &Path, entries: &[ErrorEntry]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = BufWriter::new(File::create(path)?);
    for entry in entries {
        writeln!(out, "{}", entry.to_line())?;
    }
    out.flush()
}
