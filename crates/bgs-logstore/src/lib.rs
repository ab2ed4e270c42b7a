//! Per-process append-only output logs.
//!
//! Each supervised process owns a directory under the system temp dir holding
//! `stdout.log` and `stderr.log`, one JSON object per line. The files live for
//! the lifetime of the process record and are deleted on cleanup; queries read
//! the file fresh so long-running processes can be tailed without holding
//! their output in memory.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tracing::warn;

use bgs_core::LogEntry;

/// One append-only, time-stamped log stream backed by a JSON-lines file.
///
/// A single writer task appends; readers open the file per query. Appends go
/// through an internal mutex and flush at line boundaries, so a query never
/// observes a torn line.
#[derive(Debug)]
pub struct LogStream {
    path: PathBuf,
    writer: Mutex<Option<File>>,
}

impl LogStream {
    /// Create the backing file (truncating any leftover) and open for append.
    pub fn create(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line stamped with the current time.
    pub fn append(&self, line: &str) {
        self.write_entries(std::slice::from_ref(&line), Utc::now());
    }

    /// Append a batch of lines sharing one timestamp (the flush time).
    pub fn append_batch<S: AsRef<str>>(&self, lines: &[S]) {
        if lines.is_empty() {
            return;
        }
        self.write_entries(lines, Utc::now());
    }

    fn write_entries<S: AsRef<str>>(&self, lines: &[S], timestamp: DateTime<Utc>) {
        let mut buf = Vec::with_capacity(lines.len() * 64);
        for line in lines {
            let entry = LogEntry::new(timestamp, line.as_ref());
            match serde_json::to_vec(&entry) {
                Ok(mut encoded) => {
                    encoded.push(b'\n');
                    buf.extend_from_slice(&encoded);
                }
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "failed to encode log entry");
                }
            }
        }

        let mut guard = self.writer.lock().expect("log writer lock poisoned");
        let Some(file) = guard.as_mut() else {
            warn!(path = %self.path.display(), "dropping log lines: stream is closed");
            return;
        };
        if let Err(e) = file.write_all(&buf).and_then(|_| file.flush()) {
            warn!(path = %self.path.display(), error = %e, "failed to write log entries");
        }
    }

    /// Entries in chronological order, time-filtered (inclusive bounds) with
    /// `tail` applied after filtering. Malformed lines are skipped with a
    /// warning; a partially written trailing line is not returned.
    pub fn query(
        &self,
        tail: Option<usize>,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Vec<LogEntry> {
        let raw = match std::fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read log file");
                return Vec::new();
            }
        };

        let text = String::from_utf8_lossy(&raw);
        // Drop anything after the last newline: an in-flight append.
        let complete = match text.rfind('\n') {
            Some(pos) => &text[..pos],
            None => return Vec::new(),
        };

        let mut entries: Vec<LogEntry> = complete
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str::<LogEntry>(line) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "skipping malformed log line");
                    None
                }
            })
            .filter(|entry| since.is_none_or(|s| entry.timestamp >= s))
            .filter(|entry| until.is_none_or(|u| entry.timestamp <= u))
            .collect();

        if let Some(tail) = tail {
            if entries.len() > tail {
                entries.drain(..entries.len() - tail);
            }
        }
        entries
    }

    /// Flush, release the writer, and delete the backing file. Repeated calls
    /// are no-ops.
    pub fn close(&self) {
        let mut guard = self.writer.lock().expect("log writer lock poisoned");
        if guard.take().is_none() {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove log file");
            }
        }
    }
}

/// The log directory for one process: `<tmp>/<prefix>_<nonce>/` with one
/// stream per child output channel. The directory is removed when the owner
/// drops the handle after closing the streams.
#[derive(Debug)]
pub struct ProcessLogDir {
    // Held for its Drop: removes the directory tree.
    _dir: TempDir,
    stdout: LogStream,
    stderr: LogStream,
}

impl ProcessLogDir {
    pub fn create() -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("bgshell_logs_").tempdir()?;
        let stdout = LogStream::create(dir.path().join("stdout.log"))?;
        let stderr = LogStream::create(dir.path().join("stderr.log"))?;
        Ok(Self {
            _dir: dir,
            stdout,
            stderr,
        })
    }

    pub fn stdout(&self) -> &LogStream {
        &self.stdout
    }

    pub fn stderr(&self) -> &LogStream {
        &self.stderr
    }

    /// Close both streams, deleting their files.
    pub fn close(&self) {
        self.stdout.close();
        self.stderr.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn stream() -> (tempfile::TempDir, LogStream) {
        let dir = tempfile::tempdir().unwrap();
        let stream = LogStream::create(dir.path().join("out.log")).unwrap();
        (dir, stream)
    }

    #[test]
    fn test_append_and_query_in_order() {
        let (_dir, stream) = stream();
        stream.append("first");
        stream.append("second");
        let entries = stream.query(None, None, None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "first");
        assert_eq!(entries[1].text, "second");
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn test_batch_shares_one_timestamp() {
        let (_dir, stream) = stream();
        stream.append_batch(&["a", "b", "c"]);
        let entries = stream.query(None, None, None);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].timestamp, entries[1].timestamp);
        assert_eq!(entries[1].timestamp, entries[2].timestamp);
    }

    #[test]
    fn test_tail_applies_after_time_filter() {
        let (_dir, stream) = stream();
        stream.append_batch(&["a", "b", "c", "d"]);
        let entries = stream.query(Some(2), None, None);
        assert_eq!(
            entries.iter().map(|e| e.text.as_str()).collect::<Vec<_>>(),
            ["c", "d"]
        );
    }

    #[test]
    fn test_since_until_bounds_are_inclusive() {
        let (_dir, stream) = stream();
        stream.append("x");
        let ts = stream.query(None, None, None)[0].timestamp;
        assert_eq!(stream.query(None, Some(ts), Some(ts)).len(), 1);
        assert!(stream
            .query(None, Some(ts + Duration::microseconds(1)), None)
            .is_empty());
        assert!(stream
            .query(None, None, Some(ts - Duration::microseconds(1)))
            .is_empty());
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let (_dir, stream) = stream();
        stream.append("good");
        {
            let mut guard = stream.writer.lock().unwrap();
            guard
                .as_mut()
                .unwrap()
                .write_all(b"{not json}\n")
                .unwrap();
        }
        stream.append("also good");
        let entries = stream.query(None, None, None);
        assert_eq!(
            entries.iter().map(|e| e.text.as_str()).collect::<Vec<_>>(),
            ["good", "also good"]
        );
    }

    #[test]
    fn test_partial_trailing_line_is_not_returned() {
        let (_dir, stream) = stream();
        stream.append("complete");
        {
            let mut guard = stream.writer.lock().unwrap();
            guard
                .as_mut()
                .unwrap()
                .write_all(br#"{"timestamp":"2025-01-01T00:00:00.000000Z","text":"torn"#)
                .unwrap();
        }
        let entries = stream.query(None, None, None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "complete");
    }

    #[test]
    fn test_close_deletes_file_and_is_idempotent() {
        let (_dir, stream) = stream();
        stream.append("x");
        let path = stream.path().to_path_buf();
        assert!(path.exists());
        stream.close();
        assert!(!path.exists());
        stream.close();
        assert!(stream.query(None, None, None).is_empty());
    }

    #[test]
    fn test_append_after_close_is_dropped() {
        let (_dir, stream) = stream();
        stream.close();
        stream.append("late");
        assert!(stream.query(None, None, None).is_empty());
    }

    #[test]
    fn test_process_log_dir_layout() {
        let logs = ProcessLogDir::create().unwrap();
        assert!(logs.stdout().path().ends_with("stdout.log"));
        assert!(logs.stderr().path().ends_with("stderr.log"));
        let dir = logs.stdout().path().parent().unwrap().to_path_buf();
        assert!(dir
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("bgshell_logs_"));
        logs.close();
        drop(logs);
        assert!(!dir.exists());
    }
}
