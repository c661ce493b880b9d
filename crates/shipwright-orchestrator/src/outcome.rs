use camino::Utf8PathBuf;
use serde::Serialize;
use shipwright_utils::ExitCode;

use crate::state::{FailureReason, RunPhase};

/// Where a run left its files. Paths are `None` when the file was not written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunArtifacts {
    pub run_dir: Utf8PathBuf,
    pub audit_log: Utf8PathBuf,
    pub spec: Option<Utf8PathBuf>,
    pub report: Option<Utf8PathBuf>,
    pub report_json: Option<Utf8PathBuf>,
    pub deliverable: Option<Utf8PathBuf>,
}

/// Result of [`Orchestrator::execute`](crate::Orchestrator::execute).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunOutcome {
    pub run_id: String,
    pub final_phase: RunPhase,
    pub failure_reason: Option<FailureReason>,
    /// Attempts that reached validation.
    pub attempts: u32,
    pub artifacts: RunArtifacts,
    /// Summary of the last validation report, if any.
    pub summary: Option<String>,
}

impl RunOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.final_phase, RunPhase::Done)
    }

    #[must_use]
    pub const fn exit_code(&self) -> ExitCode {
        match self.failure_reason {
            Some(reason) => reason.exit_code(),
            None if self.is_success() => ExitCode::SUCCESS,
            None => ExitCode::INTERNAL,
        }
    }
}
