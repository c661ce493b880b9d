//! Append-only JSONL audit log, one per run.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("audit log {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("audit record could not be encoded: {0}")]
    Encode(String),

    #[error("audit log {path} line {line} is not a valid record: {reason}")]
    Corrupt {
        path: String,
        line: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEntry {
    PhaseTransition {
        from: String,
        to: String,
        event: String,
        attempt: u32,
    },
    DialogTurn {
        turn: u32,
        question: String,
        answer: String,
        #[serde(default)]
        fallback: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub run_id: String,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: AuditEntry,
}

/// Writer for `<run_dir>/audit.jsonl`.
///
/// Every [`append`](Self::append) is flushed and `fdatasync`ed before it
/// returns, so a record the caller has seen succeed survives a crash.
#[derive(Debug)]
pub struct AuditLog {
    path: Utf8PathBuf,
    run_id: String,
    file: File,
    next_seq: u64,
}

impl AuditLog {
    /// Open (creating if needed) the log at `path` for `run_id`.
    pub fn open(path: &Utf8Path, run_id: impl Into<String>) -> Result<Self, AuditError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| io_error(path, &e))?;
        debug!(path = %path, "audit log opened");
        Ok(Self {
            path: path.to_path_buf(),
            run_id: run_id.into(),
            file,
            next_seq: 1,
        })
    }

    pub fn append(&mut self, entry: AuditEntry) -> Result<u64, AuditError> {
        let record = AuditRecord {
            run_id: self.run_id.clone(),
            seq: self.next_seq,
            timestamp: Utc::now(),
            entry,
        };
        let mut line =
            serde_json::to_string(&record).map_err(|e| AuditError::Encode(e.to_string()))?;
        line.push('\n');

        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.flush())
            .and_then(|()| self.file.sync_data())
            .map_err(|e| io_error(&self.path, &e))?;

        self.next_seq += 1;
        Ok(record.seq)
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Records written through this handle.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.next_seq - 1
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read every record back, in file order.
    pub fn read_all(path: &Utf8Path) -> Result<Vec<AuditRecord>, AuditError> {
        let file = File::open(path).map_err(|e| io_error(path, &e))?;
        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| io_error(path, &e))?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|e| AuditError::Corrupt {
                path: path.to_string(),
                line: idx + 1,
                reason: e.to_string(),
            })?;
            records.push(record);
        }
        Ok(records)
    }
}

fn io_error(path: &Utf8Path, err: &std::io::Error) -> AuditError {
    AuditError::Io {
        path: path.to_string(),
        reason: err.to_string(),
    }
}
