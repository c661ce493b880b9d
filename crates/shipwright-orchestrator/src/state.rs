//! The run state machine.

use serde::{Deserialize, Serialize};
use shipwright_model::FailureKind;
use shipwright_utils::ExitCode;

use crate::error::OrchestratorError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    Collecting,
    Generating,
    Validating,
    Repairing,
    Packaging,
    Done,
    Failed,
}

impl RunPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Phase outcomes, already classified at the phase boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case", tag = "event")]
#[strum(serialize_all = "snake_case")]
pub enum RunEvent {
    SpecComplete,
    TurnLimitExceeded,
    InvalidInput,
    ProjectProduced,
    /// `retryable` is false once the immediate retry has been spent, or when
    /// the error is not a collaborator output error at all.
    GenerationFailed { retryable: bool },
    Accepted,
    Rejected,
    SandboxError,
    RepairScheduled,
    Packaged,
    PackagingFailed,
    Cancelled,
}

/// Why a run ended in FAILED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    #[strum(to_string = "requirements incomplete")]
    RequirementsIncomplete,
    #[strum(to_string = "generation failed")]
    GenerationFailed,
    #[strum(to_string = "validation exhausted")]
    ValidationExhausted,
    #[strum(to_string = "sandbox failure")]
    SandboxFailure,
    #[strum(to_string = "packaging failed")]
    PackagingFailed,
    #[strum(to_string = "cancelled")]
    Cancelled,
    #[strum(to_string = "invalid input")]
    InvalidInput,
}

impl FailureReason {
    #[must_use]
    pub const fn exit_code(self) -> ExitCode {
        match self {
            Self::RequirementsIncomplete => ExitCode::REQUIREMENTS_INCOMPLETE,
            Self::GenerationFailed => ExitCode::GENERATION_FAILED,
            Self::ValidationExhausted => ExitCode::VALIDATION_EXHAUSTED,
            Self::SandboxFailure => ExitCode::SANDBOX_FAILURE,
            Self::PackagingFailed => ExitCode::PACKAGING_FAILED,
            Self::Cancelled => ExitCode::CANCELLED,
            Self::InvalidInput => ExitCode::INVALID_INPUT,
        }
    }

    /// Taxonomy kind behind this reason, where there is one.
    #[must_use]
    pub const fn kind(self) -> Option<FailureKind> {
        match self {
            Self::GenerationFailed => Some(FailureKind::Generation),
            Self::ValidationExhausted => Some(FailureKind::ValidationRejection),
            Self::SandboxFailure => Some(FailureKind::Sandbox),
            Self::Cancelled => Some(FailureKind::Cancellation),
            Self::InvalidInput => Some(FailureKind::InvalidInput),
            Self::RequirementsIncomplete | Self::PackagingFailed => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: RunPhase,
    pub to: RunPhase,
    pub event: RunEvent,
    /// Attempt counter after the transition.
    pub attempt: u32,
    pub reason: Option<FailureReason>,
}

/// The transition table.
///
/// `attempt` is the current attempt counter (0 while collecting) and `max`
/// the attempt limit. Pairs not in the table, and anything from a terminal
/// phase, are rejected.
pub fn decide(
    phase: RunPhase,
    event: RunEvent,
    attempt: u32,
    max: u32,
) -> Result<Transition, OrchestratorError> {
    use RunEvent as E;
    use RunPhase as P;

    let go = |to: RunPhase, attempt: u32| Transition {
        from: phase,
        to,
        event,
        attempt,
        reason: None,
    };
    let fail = |reason: FailureReason| Transition {
        from: phase,
        to: P::Failed,
        event,
        attempt,
        reason: Some(reason),
    };
    let invalid = || OrchestratorError::InvalidTransition { phase, event };

    if max == 0 || attempt > max {
        return Err(invalid());
    }

    let transition = match (phase, event) {
        (P::Done | P::Failed, _) => return Err(invalid()),
        (_, E::Cancelled) => fail(FailureReason::Cancelled),

        (P::Collecting, E::SpecComplete) => go(P::Generating, 1),
        (P::Collecting, E::TurnLimitExceeded) => fail(FailureReason::RequirementsIncomplete),
        (P::Collecting, E::InvalidInput) => fail(FailureReason::InvalidInput),

        (P::Generating, E::ProjectProduced) => go(P::Validating, attempt),
        (P::Generating, E::GenerationFailed { retryable: true }) => go(P::Generating, attempt),
        (P::Generating, E::GenerationFailed { retryable: false }) => {
            fail(FailureReason::GenerationFailed)
        }

        (P::Validating, E::Accepted) => go(P::Packaging, attempt),
        (P::Validating, E::Rejected) if attempt < max => go(P::Repairing, attempt),
        (P::Validating, E::Rejected) => fail(FailureReason::ValidationExhausted),
        (P::Validating, E::SandboxError) => fail(FailureReason::SandboxFailure),

        (P::Repairing, E::RepairScheduled) if attempt < max => go(P::Generating, attempt + 1),

        (P::Packaging, E::Packaged) => go(P::Done, attempt),
        (P::Packaging, E::PackagingFailed) => fail(FailureReason::PackagingFailed),

        _ => return Err(invalid()),
    };

    // Only COLLECTING starts at attempt 0, and nothing may go back there.
    if transition.to != P::Failed && transition.attempt == 0 {
        return Err(invalid());
    }
    Ok(transition)
}
