//! Append-only message log
//!
//! One JSON-encoded `TimelineMessage` per line. Records are never edited or
//! deleted; replay skips lines that fail to parse.

use crate::timeline::TimelineMessage;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Message log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// File-backed timeline log
pub struct MessageStore {
    path: PathBuf,
    /// Serializes appends; holds the timestamp of the last record written
    write_lock: Mutex<Option<DateTime<Utc>>>,
}

impl MessageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Durably append one message and return it as written.
    ///
    /// The timestamp is assigned here, under the write lock, and never goes
    /// below the previous record's, so log order and time order agree.
    pub async fn append(&self, mut msg: TimelineMessage) -> StoreResult<TimelineMessage> {
        let mut last = self.write_lock.lock().await;

        let now = Utc::now();
        msg.timestamp = last.map_or(now, |prev| prev.max(now));
        let mut line = serde_json::to_vec(&msg)?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.sync_data().await?;
        *last = Some(msg.timestamp);

        tracing::debug!(msg_id = %msg.id, bytes = line.len(), "Appended message");
        Ok(msg)
    }

    /// The most recent `limit` messages, in append order.
    pub async fn load_history(&self, limit: usize) -> StoreResult<Vec<TimelineMessage>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let raw = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let text = String::from_utf8_lossy(&raw);
        let mut messages: Vec<TimelineMessage> = Vec::new();
        let mut skipped = 0usize;
        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(msg) => messages.push(msg),
                Err(_) => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::warn!(path = %self.path.display(), skipped, "Skipped unparsable log lines");
        }

        let start = messages.len().saturating_sub(limit);
        Ok(messages.split_off(start))
    }
}
