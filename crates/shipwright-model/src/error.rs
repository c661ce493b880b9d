use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification every phase failure is translated into before it reaches
/// the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// The initial request is unusable. Fatal before any phase starts.
    InvalidInput,
    /// The generation collaborator produced empty or malformed output.
    Generation,
    /// Tests ran and at least one failed.
    ValidationRejection,
    /// The sandbox could not execute the suite at all.
    Sandbox,
    /// Someone asked the run to stop.
    Cancellation,
}

impl FailureKind {
    /// Whether the orchestrator may try again after this kind of failure.
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        matches!(self, Self::Generation | Self::ValidationRejection)
    }
}

/// Reasons a file map cannot become a [`GeneratedProject`](crate::GeneratedProject).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProjectError {
    #[error("project contains no files")]
    Empty,

    #[error("invalid project path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("path `{path}` appears more than once after normalisation")]
    DuplicatePath { path: String },

    #[error("project has no test files")]
    MissingTests,

    #[error("project has no source files")]
    MissingSource,

    #[error("attempt numbers start at 1")]
    ZeroAttempt,

    #[error("invalid classification pattern `{pattern}`: {reason}")]
    Pattern { pattern: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_generation_and_rejection_are_recoverable() {
        assert!(FailureKind::Generation.is_recoverable());
        assert!(FailureKind::ValidationRejection.is_recoverable());
        assert!(!FailureKind::Sandbox.is_recoverable());
        assert!(!FailureKind::InvalidInput.is_recoverable());
        assert!(!FailureKind::Cancellation.is_recoverable());
    }

    #[test]
    fn kinds_render_in_snake_case() {
        assert_eq!(FailureKind::ValidationRejection.to_string(), "validation_rejection");
        assert_eq!(
            serde_json::to_string(&FailureKind::Sandbox).unwrap(),
            "\"sandbox\""
        );
    }
}
