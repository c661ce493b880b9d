use std::time::Duration;
use thiserror::Error;

/// Why a bounded subprocess did not produce an exit status.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Failed to spawn `{program}`: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Execution timed out after {:.1} seconds", .timeout.as_secs_f64())]
    Timeout { timeout: Duration },

    #[error("Execution cancelled")]
    Cancelled,

    #[error("I/O error while supervising `{program}`: {reason}")]
    Io { program: String, reason: String },
}

impl RunnerError {
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
