//! Run orchestration.
//!
//! - `state`: the transition table as a pure function, [`decide`].
//! - `run`: [`OrchestrationRun`], the single mutable record of a run.
//! - `workflow`: [`Orchestrator`], the async driver that calls the phases,
//!   feeds their outcomes to [`decide`], and writes the audit log and
//!   artifacts.
//!
//! Outside this crate only [`Orchestrator::execute`] drives runs; the state
//! machine is public so it can be inspected and tested on its own.

mod error;
mod outcome;
mod run;
mod state;
mod workflow;

pub use error::OrchestratorError;
pub use outcome::{RunArtifacts, RunOutcome};
pub use run::{OrchestrationRun, SnapshotNames};
pub use state::{FailureReason, RunEvent, RunPhase, Transition, decide};
pub use workflow::{Orchestrator, OrchestratorSettings};
