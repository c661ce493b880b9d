use std::sync::Arc;

use camino::Utf8Path;
use chrono::{DateTime, Utc};
use shipwright_model::{FailureRecord, GeneratedProject, SpecDocument, ValidationReport};
use shipwright_receipt::RunSnapshot;
use tracing::debug;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::state::{FailureReason, RunEvent, RunPhase, Transition, decide};

/// Everything known about one run.
///
/// Phase and attempt only move through [`apply`](Self::apply); the attempt
/// history only grows through [`record_attempt`](Self::record_attempt).
#[derive(Debug)]
pub struct OrchestrationRun {
    run_id: Uuid,
    phase: RunPhase,
    attempt: u32,
    max_attempts: u32,
    spec: Option<Arc<SpecDocument>>,
    history: Vec<(GeneratedProject, ValidationReport)>,
    transitions: Vec<Transition>,
    failure_reason: Option<FailureReason>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl OrchestrationRun {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self::with_id(Uuid::new_v4(), max_attempts)
    }

    #[must_use]
    pub fn with_id(run_id: Uuid, max_attempts: u32) -> Self {
        Self {
            run_id,
            phase: RunPhase::Collecting,
            attempt: 0,
            max_attempts,
            spec: None,
            history: Vec::new(),
            transitions: Vec::new(),
            failure_reason: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Feed `event` through the transition table.
    pub fn apply(&mut self, event: RunEvent) -> Result<Transition, OrchestratorError> {
        let transition = decide(self.phase, event, self.attempt, self.max_attempts)?;
        debug!(
            from = %transition.from,
            to = %transition.to,
            %event,
            attempt = transition.attempt,
            "transition"
        );
        self.phase = transition.to;
        self.attempt = transition.attempt;
        if let Some(reason) = transition.reason {
            self.failure_reason = Some(reason);
        }
        if self.phase.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        self.transitions.push(transition);
        Ok(transition)
    }

    pub fn set_spec(&mut self, spec: Arc<SpecDocument>) {
        self.spec = Some(spec);
    }

    /// Append a validated attempt. Attempt numbers must strictly increase.
    pub fn record_attempt(
        &mut self,
        project: GeneratedProject,
        report: ValidationReport,
    ) -> Result<(), OrchestratorError> {
        let last = self.history.last().map_or(0, |(p, _)| p.attempt());
        if project.attempt() <= last || report.attempt() != project.attempt() {
            return Err(OrchestratorError::AttemptOutOfOrder {
                attempt: project.attempt(),
                last,
            });
        }
        self.history.push((project, report));
        Ok(())
    }

    /// Failures from the latest validation, the input to a repair.
    #[must_use]
    pub fn last_failures(&self) -> &[FailureRecord] {
        self.history.last().map_or(&[], |(_, r)| r.failures())
    }

    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    #[must_use]
    pub const fn phase(&self) -> RunPhase {
        self.phase
    }

    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn spec(&self) -> Option<&Arc<SpecDocument>> {
        self.spec.as_ref()
    }

    #[must_use]
    pub fn history(&self) -> &[(GeneratedProject, ValidationReport)] {
        &self.history
    }

    #[must_use]
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    #[must_use]
    pub const fn failure_reason(&self) -> Option<FailureReason> {
        self.failure_reason
    }

    /// Borrowed view for the report writers. `names` holds the rendered
    /// run id, phase and reason so the snapshot can borrow them.
    #[must_use]
    pub fn snapshot<'a>(
        &'a self,
        names: &'a SnapshotNames,
        deliverable: Option<&'a Utf8Path>,
    ) -> RunSnapshot<'a> {
        RunSnapshot {
            run_id: &names.run_id,
            final_phase: &names.phase,
            failure_reason: names.reason.as_deref(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            max_attempts: self.max_attempts,
            spec: self.spec.as_deref(),
            history: &self.history,
            deliverable,
        }
    }

    #[must_use]
    pub fn names(&self) -> SnapshotNames {
        SnapshotNames {
            run_id: self.run_id.to_string(),
            phase: self.phase.to_string(),
            reason: self.failure_reason.map(|r| r.to_string()),
        }
    }
}

/// Owned strings a [`RunSnapshot`] borrows.
#[derive(Debug, Clone)]
pub struct SnapshotNames {
    run_id: String,
    phase: String,
    reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use shipwright_model::{FileClassifier, Requirement, TestCounts};

    fn project(spec: &Arc<SpecDocument>, attempt: u32) -> GeneratedProject {
        GeneratedProject::new(
            Arc::clone(spec),
            attempt,
            [("lib.py", "x = 1\n"), ("tests/test_lib.py", "def test_x(): pass\n")],
            &FileClassifier::default(),
        )
        .unwrap()
    }

    fn spec() -> Arc<SpecDocument> {
        Arc::new(SpecDocument::complete(vec![Requirement::user("lib")]))
    }

    #[test]
    fn walks_to_done() {
        let mut run = OrchestrationRun::new(3);
        for event in [
            RunEvent::SpecComplete,
            RunEvent::ProjectProduced,
            RunEvent::Accepted,
            RunEvent::Packaged,
        ] {
            run.apply(event).unwrap();
        }
        assert_eq!(run.phase(), RunPhase::Done);
        assert_eq!(run.attempt(), 1);
        assert_eq!(run.transitions().len(), 4);
        assert!(run.failure_reason().is_none());
    }

    #[test]
    fn terminal_run_refuses_events() {
        let mut run = OrchestrationRun::new(3);
        run.apply(RunEvent::Cancelled).unwrap();
        assert_eq!(run.failure_reason(), Some(FailureReason::Cancelled));
        assert!(run.apply(RunEvent::SpecComplete).is_err());
        assert_eq!(run.transitions().len(), 1);
    }

    #[test]
    fn attempts_must_increase() {
        let spec = spec();
        let mut run = OrchestrationRun::new(3);
        let report = |n| ValidationReport::from_counts(n, TestCounts::new(0, 1), vec![]);

        run.record_attempt(project(&spec, 1), report(1)).unwrap();
        assert!(run.record_attempt(project(&spec, 1), report(1)).is_err());
        assert!(run.record_attempt(project(&spec, 3), report(2)).is_err());
        run.record_attempt(project(&spec, 2), report(2)).unwrap();

        assert_eq!(run.history().len(), 2);
        assert_eq!(run.last_failures()[0].test_id, "<suite>");
    }

    #[test]
    fn snapshot_reflects_failure() {
        let mut run = OrchestrationRun::new(1);
        run.apply(RunEvent::TurnLimitExceeded).unwrap();
        let names = run.names();
        let snap = run.snapshot(&names, None);
        assert_eq!(snap.final_phase, "FAILED");
        assert_eq!(snap.failure_reason, Some("requirements incomplete"));
        assert!(snap.finished_at.is_some());
    }

    proptest! {
        #[test]
        fn attempt_never_decreases_or_exceeds_limit(
            max in 1u32..5,
            outcomes in proptest::collection::vec(any::<bool>(), 0..8),
        ) {
            let mut run = OrchestrationRun::new(max);
            run.apply(RunEvent::SpecComplete).unwrap();
            let mut seen = run.attempt();
            for accepted in outcomes {
                if run.phase().is_terminal() {
                    break;
                }
                run.apply(RunEvent::ProjectProduced).unwrap();
                let event = if accepted { RunEvent::Accepted } else { RunEvent::Rejected };
                run.apply(event).unwrap();
                match run.phase() {
                    RunPhase::Repairing => {
                        run.apply(RunEvent::RepairScheduled).unwrap();
                    }
                    RunPhase::Packaging => {
                        run.apply(RunEvent::Packaged).unwrap();
                    }
                    _ => {}
                }
                prop_assert!(run.attempt() >= seen);
                prop_assert!(run.attempt() <= max);
                seen = run.attempt();
            }
        }
    }
}
