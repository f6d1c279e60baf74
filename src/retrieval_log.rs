//! Durable JSONL retrieval log.
//!
//! Every retrieval record is appended as one JSON line. Writers from any
//! thread or process sharing the same path serialize through an advisory
//! lock file (`<path>.lock`) created with exclusive create-or-fail
//! semantics and retried until a timeout.
//!
//! # Degrade policy
//!
//! The lock is best-effort, not mutual exclusion. A writer that cannot
//! take the lock within `lock_timeout` logs a warning and appends
//! anyway. A stale lock file left by a crashed writer therefore slows
//! each append by the timeout but never blocks it. Lines are written
//! with a single append-mode `write_all`, so even unsynchronized writers
//! rarely interleave.
//!
//! Through [`RecordSink`] the wait happens on tokio's blocking pool, so a
//! held lock never stalls other tasks on the executor.

use anyhow::{Context, Result};
use async_trait::async_trait;
use fusion_retrieval_core::sink::RecordSink;
use fusion_retrieval_core::RetrievalRecord;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// File-backed [`RecordSink`].
#[derive(Debug, Clone)]
pub struct JsonlLog {
    path: PathBuf,
    lock_timeout: Duration,
}

impl JsonlLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append on the calling thread, waiting for the lock if needed.
    pub fn append_blocking(&self, record: &RetrievalRecord) -> Result<()> {
        append_jsonl(record, &self.path, self.lock_timeout)
    }

    /// Records currently in the log, newest first.
    pub fn read_recent(&self, limit: usize) -> Result<Vec<RetrievalRecord>> {
        read_recent(&self.path, limit)
    }
}

// The lock wait sleeps, so it runs on the blocking pool.
#[async_trait]
impl RecordSink for JsonlLog {
    async fn append(&self, record: &RetrievalRecord) -> Result<()> {
        let log = self.clone();
        let record = record.clone();
        tokio::task::spawn_blocking(move || log.append_blocking(&record))
            .await
            .context("log writer task failed")?
    }
}

/// Append `value` as one JSON line to `path`, creating parent directories.
pub fn append_jsonl<T: Serialize>(value: &T, path: &Path, lock_timeout: Duration) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }
    }

    let mut line = serde_json::to_string(value).context("Failed to serialize log record")?;
    line.push('\n');

    let _lock = LockFile::acquire(&lock_path_for(path), lock_timeout);

    let mut fh = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;
    fh.write_all(line.as_bytes())
        .with_context(|| format!("Failed to write log file: {}", path.display()))?;
    Ok(())
}

/// Read up to `limit` of the most recent records, newest first.
///
/// Blank and malformed lines are skipped. A missing file is an empty log.
pub fn read_recent(path: &Path, limit: usize) -> Result<Vec<RetrievalRecord>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read log file: {}", path.display()))
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(limit);

    Ok(lines[start..]
        .iter()
        .rev()
        .filter_map(|l| serde_json::from_str::<RetrievalRecord>(l).ok())
        .collect())
}

pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Held lock file; removed on drop.
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    /// Returns `None` when the lock could not be taken in time.
    fn acquire(path: &Path, timeout: Duration) -> Option<Self> {
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => {
                    return Some(Self {
                        path: path.to_path_buf(),
                    })
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if started.elapsed() >= timeout {
                        warn!(
                            lock = %path.display(),
                            waited_ms = started.elapsed().as_millis() as u64,
                            "log lock not acquired; writing without it"
                        );
                        return None;
                    }
                    thread::sleep(LOCK_RETRY_INTERVAL);
                }
                Err(e) => {
                    warn!(lock = %path.display(), error = %e, "cannot create log lock; writing without it");
                    return None;
                }
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
