//! Question/answer channel to the requester.

use std::io::{self, BufRead};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, mpsc};

/// Recorded in place of an empty answer.
pub const FALLBACK_ANSWER: &str =
    "I don't have more info. Please proceed with reasonable assumptions.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialogError {
    /// The requester went away (EOF, closed channel).
    #[error("dialog closed by the requester")]
    Closed,

    #[error("dialog I/O failed: {0}")]
    Io(String),
}

/// One exchange, as written to the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogTurn {
    /// 1-based.
    pub turn: u32,
    pub question: String,
    pub answer: String,
    /// `answer` is [`FALLBACK_ANSWER`] because the requester gave none.
    #[serde(default)]
    pub fallback: bool,
}

/// The interactive seam. Implementations must be cancel-safe: the collector
/// may drop an in-flight `ask` when the run is cancelled.
#[async_trait]
pub trait Dialog: Send + Sync {
    async fn ask(&self, question: &str) -> Result<String, DialogError>;
}

/// Terminal dialog: questions on stderr, answers from stdin, one line each.
///
/// Stdin is read on a dedicated OS thread feeding a channel, never on the
/// runtime's blocking pool, so shutdown does not wait on a pending read.
pub struct StdioDialog {
    answers: Mutex<Option<mpsc::Receiver<io::Result<String>>>>,
}

impl StdioDialog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(None),
        }
    }
}

impl Default for StdioDialog {
    fn default() -> Self {
        Self::new()
    }
}

/// Start the reader thread. It exits at EOF, on a read error, or once the
/// receiving side is dropped.
fn spawn_stdin_reader() -> io::Result<mpsc::Receiver<io::Result<String>>> {
    let (tx, rx) = mpsc::channel(1);
    std::thread::Builder::new()
        .name("shipwright-stdin".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })?;
    Ok(rx)
}

#[async_trait]
impl Dialog for StdioDialog {
    async fn ask(&self, question: &str) -> Result<String, DialogError> {
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(format!("\n? {question}\n> ").as_bytes())
            .await
            .map_err(|e| DialogError::Io(e.to_string()))?;
        stderr
            .flush()
            .await
            .map_err(|e| DialogError::Io(e.to_string()))?;

        let mut answers = self.answers.lock().await;
        if answers.is_none() {
            *answers = Some(spawn_stdin_reader().map_err(|e| DialogError::Io(e.to_string()))?);
        }
        let Some(rx) = answers.as_mut() else {
            return Err(DialogError::Closed);
        };
        match rx.recv().await {
            Some(Ok(line)) => Ok(line),
            Some(Err(e)) => Err(DialogError::Io(e.to_string())),
            None => Err(DialogError::Closed),
        }
    }
}
