//! Reply log: which items the bot has already answered
//!
//! The dispatcher is the only writer. The log is loaded once at startup and
//! flushed once at shutdown, so it is not crash-durable: replies made after
//! the last flush are forgotten by a crash, and those items can receive one
//! more reply after a restart.

use crate::bot::item::{ItemKind, Reply};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Metadata kept for each answered item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRecord {
    pub reply_id: String,
    pub kind: ItemKind,
    pub replied_at: DateTime<Utc>,
}

impl ReplyRecord {
    pub fn new(reply: &Reply, kind: ItemKind) -> Self {
        Self {
            reply_id: reply.id.clone(),
            kind,
            replied_at: Utc::now(),
        }
    }
}

/// Item id to reply record
pub type ReplyLog = HashMap<String, ReplyRecord>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Reply log I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Reply log at {path} is malformed: {source}")]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Deduplication store consulted before every reply
pub trait ReplyStore: Send {
    /// Whether the item was already answered
    fn has(&self, id: &str) -> bool;

    /// Record a successful reply
    fn mark(&mut self, id: &str, record: ReplyRecord);

    /// Replace the in-memory log with the persisted one, returning its size
    fn load(&mut self) -> Result<usize, StoreError>;

    /// Write the in-memory log to durable storage
    fn persist(&self) -> Result<(), StoreError>;

    /// Number of answered items
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reply log kept in memory only
#[derive(Debug, Default, Clone)]
pub struct MemoryReplyStore {
    log: ReplyLog,
}

impl MemoryReplyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with answered ids
    pub fn with_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let log = ids
            .into_iter()
            .map(|id| {
                (
                    id.into(),
                    ReplyRecord {
                        reply_id: String::new(),
                        kind: ItemKind::Comment,
                        replied_at: Utc::now(),
                    },
                )
            })
            .collect();
        Self { log }
    }

    pub fn get(&self, id: &str) -> Option<&ReplyRecord> {
        self.log.get(id)
    }
}

impl ReplyStore for MemoryReplyStore {
    fn has(&self, id: &str) -> bool {
        self.log.contains_key(id)
    }

    fn mark(&mut self, id: &str, record: ReplyRecord) {
        self.log.insert(id.to_string(), record);
    }

    fn load(&mut self) -> Result<usize, StoreError> {
        Ok(self.log.len())
    }

    fn persist(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn len(&self) -> usize {
        self.log.len()
    }
}

/// Reply log persisted as a JSON object in a local file
#[derive(Debug)]
pub struct FileReplyStore {
    path: PathBuf,
    log: ReplyLog,
}

impl FileReplyStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            log: ReplyLog::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, id: &str) -> Option<&ReplyRecord> {
        self.log.get(id)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ReplyStore for FileReplyStore {
    fn has(&self, id: &str) -> bool {
        self.log.contains_key(id)
    }

    fn mark(&mut self, id: &str, record: ReplyRecord) {
        self.log.insert(id.to_string(), record);
    }

    fn load(&mut self) -> Result<usize, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No reply log found, starting empty");
                self.log.clear();
                return Ok(0);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        self.log = serde_json::from_str(&content).map_err(|source| StoreError::Serde {
            path: self.path.clone(),
            source,
        })?;

        info!(
            path = %self.path.display(),
            entries = self.log.len(),
            "Loaded reply log"
        );
        Ok(self.log.len())
    }

    fn persist(&self) -> Result<(), StoreError> {
        info!(path = %self.path.display(), entries = self.log.len(), "Saving reply log...");

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let json = serde_json::to_vec_pretty(&self.log).map_err(|source| StoreError::Serde {
            path: self.path.clone(),
            source,
        })?;

        // Write beside the target and rename so a crash mid-write keeps the old log
        let tmp = self.temp_path();
        std::fs::write(&tmp, json).map_err(|e| self.io_error(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), "Reply log saved");
        Ok(())
    }

    fn len(&self) -> usize {
        self.log.len()
    }
}
