//! Append-only activity log kept in the target root
//!
//! Each run starts with a `--- Backup started: <timestamp> ---` marker and adds
//! one `[<timestamp>] <event>` line per event. Write failures are reported
//! through tracing and otherwise ignored so they can never stop a backup.

use chrono::{DateTime, Local, SecondsFormat};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// File name of the activity log inside the target root
pub const ACTIVITY_LOG_FILE_NAME: &str = "backup_log.txt";

/// ISO-8601 timestamp used in log lines
pub fn timestamp(now: DateTime<Local>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, false)
}

pub struct ActivityLog {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    lines_written: usize,
}

impl ActivityLog {
    /// Open `<target_root>/backup_log.txt` in append mode and write the run marker.
    ///
    /// If the file cannot be opened the log degrades to a no-op.
    pub fn open(target_root: &Path) -> Self {
        let path = target_root.join(ACTIVITY_LOG_FILE_NAME);

        let writer = std::fs::create_dir_all(target_root)
            .and_then(|_| OpenOptions::new().create(true).append(true).open(&path))
            .map(BufWriter::new)
            .map_err(|e| warn!("Cannot open activity log {}: {}", path.display(), e))
            .ok();

        let mut log = Self {
            path,
            writer,
            lines_written: 0,
        };
        log.write_line(&format!("--- Backup started: {} ---", timestamp(Local::now())));
        log
    }

    /// A log that records nothing, for dry runs
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            writer: None,
            lines_written: 0,
        }
    }

    /// Append one timestamped event line
    pub fn record(&mut self, event: impl AsRef<str>) {
        let line = format!("[{}] {}", timestamp(Local::now()), event.as_ref());
        self.write_line(&line);
    }

    fn write_line(&mut self, line: &str) {
        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        if let Err(e) = writeln!(writer, "{}", line) {
            warn!("Failed to write activity log {}: {}", self.path.display(), e);
            return;
        }
        self.lines_written += 1;
    }

    /// Flush and close the log
    pub fn close(mut self) {
        self.flush();
    }

    fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                warn!("Failed to flush activity log {}: {}", self.path.display(), e);
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines successfully handed to the writer, including the run marker
    pub fn lines_written(&self) -> usize {
        self.lines_written
    }

    pub fn is_enabled(&self) -> bool {
        self.writer.is_some()
    }
}

impl Drop for ActivityLog {
    fn drop(&mut self) {
        self.flush();
    }
}
