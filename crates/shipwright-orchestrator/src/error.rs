use shipwright_receipt::AuditError;
use thiserror::Error;

use crate::state::{RunEvent, RunPhase};

/// Failures of the orchestrator itself, as opposed to a run ending in FAILED.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("no transition from {phase} on {event}")]
    InvalidTransition { phase: RunPhase, event: RunEvent },

    #[error("run cannot make progress in {phase}")]
    Stalled { phase: RunPhase },

    #[error("attempt {attempt} does not follow attempt {last}")]
    AttemptOutOfOrder { attempt: u32, last: u32 },

    #[error("run directory {path} could not be prepared: {reason}")]
    Setup { path: String, reason: String },

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("failed to write run artifact: {reason}")]
    Artifact { reason: String },
}
