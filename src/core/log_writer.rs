//! Append-only JSONL log channels.
//!
//! Each channel is one newline-delimited JSON file. Files are opened per
//! write, locked exclusively for the duration of the append and never
//! truncated, rotated or compacted.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use fs2::FileExt;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error};

/// Named log destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogChannel {
    /// Every submission
    Submissions,

    /// Chat widget submissions only
    WhatsApp,

    /// Failed spreadsheet relays
    SheetFailures,

    /// Browser replicator outcomes
    Replicator,
}

impl LogChannel {
    pub const ALL: [LogChannel; 4] = [
        LogChannel::Submissions,
        LogChannel::WhatsApp,
        LogChannel::SheetFailures,
        LogChannel::Replicator,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            LogChannel::Submissions => "submissions.jsonl",
            LogChannel::WhatsApp => "whatsapp.jsonl",
            LogChannel::SheetFailures => "sheets_failures.jsonl",
            LogChannel::Replicator => "replicator.jsonl",
        }
    }

    /// Parse a channel name as accepted on the command line
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "submissions" | "general" => Some(LogChannel::Submissions),
            "whatsapp" => Some(LogChannel::WhatsApp),
            "sheets" | "sheet_failures" | "sheets_failures" => Some(LogChannel::SheetFailures),
            "replicator" | "browser" => Some(LogChannel::Replicator),
            _ => None,
        }
    }
}

/// Errors that can occur while appending a record
#[derive(Debug, Error)]
pub enum LogWriteError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Append task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Writer for the JSONL log channels under one directory
#[derive(Debug, Clone)]
pub struct LogWriter {
    log_dir: PathBuf,
}

impl LogWriter {
    /// Create a writer rooted at `log_dir`. Nothing touches disk until the
    /// first append.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Path to a channel's file
    pub fn channel_path(&self, channel: LogChannel) -> PathBuf {
        self.log_dir.join(channel.file_name())
    }

    /// Append a record, reporting failures to diagnostics only.
    ///
    /// Capture failures never abort the pipeline, so this returns `false`
    /// instead of an error when the write did not land.
    pub async fn append<T: Serialize>(&self, channel: LogChannel, fields: &T) -> bool {
        match self.try_append(channel, fields).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    channel = channel.file_name(),
                    error = %e,
                    "Failed to append log record"
                );
                false
            }
        }
    }

    /// Append a record, merged with a write-time `logged_at` timestamp, as
    /// one JSON line.
    pub async fn try_append<T: Serialize>(
        &self,
        channel: LogChannel,
        fields: &T,
    ) -> Result<(), LogWriteError> {
        #[derive(Serialize)]
        struct LineWrapper<'a, T> {
            logged_at: String,
            #[serde(flatten)]
            fields: &'a T,
        }

        let wrapper = LineWrapper {
            logged_at: Utc::now().to_rfc3339(),
            fields,
        };

        let mut line = serde_json::to_string(&wrapper)?;
        line.push('\n');

        let log_dir = self.log_dir.clone();
        let path = self.channel_path(channel);

        tokio::task::spawn_blocking(move || append_line(&log_dir, &path, line.as_bytes())).await??;

        debug!(channel = channel.file_name(), "Appended log record");
        Ok(())
    }

    /// Replay all records of a channel in append order
    pub async fn read(&self, channel: LogChannel) -> anyhow::Result<Vec<Value>> {
        let path = self.channel_path(channel);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path)
            .await
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        let reader = BufReader::new(file);
        let mut lines = reader.lines();
        let mut records = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let record: Value = serde_json::from_str(&line)
                .with_context(|| format!("Failed to parse log line: {}", line))?;
            records.push(record);
        }

        Ok(records)
    }
}

/// Write one complete line under an exclusive lock
fn append_line(log_dir: &Path, path: &Path, line: &[u8]) -> Result<(), LogWriteError> {
    let io_err = |source: std::io::Error| LogWriteError::Io {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(log_dir).map_err(|source| LogWriteError::Io {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(io_err)?;

    file.lock_exclusive().map_err(io_err)?;

    // Single write so a record is never split across concurrent appenders
    let result = file.write_all(line).and_then(|()| file.flush());
    let unlock = file.unlock();

    result.map_err(io_err)?;
    unlock.map_err(io_err)?;
    Ok(())
}
