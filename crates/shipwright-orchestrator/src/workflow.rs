use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use shipwright_config::{Config, ConfigError};
use shipwright_model::{GeneratedProject, SpecDocument, Verdict};
use shipwright_phases::{
    ChecklistInterviewer, CodeGenerator, CollectError, Dialog, GenerationError, Packager,
    RequirementsCollector, Synthesizer, ZipPackager,
};
use shipwright_receipt::{AuditEntry, AuditError, AuditLog, write_reports, write_spec_artifact};
use shipwright_sandbox::{SandboxConfig, ValidationCancelled, ValidationSandbox};
use shipwright_utils::{CancellationToken, RunLayout};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::OrchestratorError;
use crate::outcome::{RunArtifacts, RunOutcome};
use crate::run::OrchestrationRun;
use crate::state::{RunEvent, RunPhase, Transition};

/// Run-level knobs, resolved from [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub max_attempts: u32,
    pub sandbox_timeout: Duration,
    pub state_dir: Utf8PathBuf,
}

impl OrchestratorSettings {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.run.max_attempts,
            sandbox_timeout: config.sandbox_timeout(),
            state_dir: config.run.state_dir.clone(),
        }
    }
}

/// Drives one request through COLLECTING to DONE or FAILED.
///
/// Runs are independent: `execute` may be called concurrently, and each call
/// gets its own run id, run directory and audit log.
pub struct Orchestrator {
    collector: RequirementsCollector,
    generator: CodeGenerator,
    sandbox: ValidationSandbox,
    packager: Arc<dyn Packager>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        collector: RequirementsCollector,
        generator: CodeGenerator,
        sandbox: ValidationSandbox,
        packager: Arc<dyn Packager>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            collector,
            generator,
            sandbox,
            packager,
            settings,
        }
    }

    /// Wire the default phases from configuration around the two external
    /// collaborators.
    pub fn from_config(
        config: &Config,
        dialog: Arc<dyn Dialog>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let interviewer = Arc::new(ChecklistInterviewer::new(config.interview.topics.clone()));
        Ok(Self::new(
            RequirementsCollector::new(dialog, interviewer, config.run.turn_limit),
            CodeGenerator::new(synthesizer, config.classifier()?),
            ValidationSandbox::new(SandboxConfig::from_settings(&config.sandbox)),
            Arc::new(ZipPackager),
            OrchestratorSettings::from_config(config),
        ))
    }

    #[must_use]
    pub const fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Run `request` to a terminal phase.
    ///
    /// A run ending in FAILED is still `Ok`; `Err` means the orchestrator
    /// could not keep its own records (run directory, audit log, artifacts).
    pub async fn execute(
        &self,
        request: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, OrchestratorError> {
        let run = OrchestrationRun::new(self.settings.max_attempts);
        let span = info_span!("run", run_id = %run.run_id());
        self.drive(run, request, cancel).instrument(span).await
    }

    async fn drive(
        &self,
        mut run: OrchestrationRun,
        request: &str,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, OrchestratorError> {
        let run_id = run.run_id().to_string();
        let layout = RunLayout::new(&self.settings.state_dir, &run_id);
        layout.ensure().map_err(|e| OrchestratorError::Setup {
            path: layout.root().to_string(),
            reason: e.to_string(),
        })?;
        let mut journal = Journal {
            audit: AuditLog::open(&layout.audit_log(), run_id.as_str())?,
        };
        info!(
            max_attempts = run.max_attempts(),
            run_dir = %layout.root(),
            "run started"
        );

        let spec_path = self
            .collect(&mut run, &mut journal, &layout, request, cancel)
            .instrument(info_span!("phase", phase = %RunPhase::Collecting))
            .await?;

        let mut deliverable = None;
        while !run.phase().is_terminal() {
            if cancel.is_cancelled() {
                journal.record(&mut run, RunEvent::Cancelled)?;
                break;
            }
            match run.phase() {
                RunPhase::Generating => {
                    let span = info_span!(
                        "phase",
                        phase = %RunPhase::Generating,
                        attempt = run.attempt()
                    );
                    self.generate_and_validate(&mut run, &mut journal, cancel)
                        .instrument(span)
                        .await?;
                }
                RunPhase::Repairing => {
                    journal.record(&mut run, RunEvent::RepairScheduled)?;
                }
                RunPhase::Packaging => {
                    let dest = layout.deliverable();
                    let span = info_span!("phase", phase = %RunPhase::Packaging);
                    let packaged = span.in_scope(|| self.package(&run, &dest));
                    if packaged {
                        journal.record(&mut run, RunEvent::Packaged)?;
                        deliverable = Some(dest);
                    } else {
                        journal.record(&mut run, RunEvent::PackagingFailed)?;
                    }
                }
                // COLLECTING and VALIDATING are always left by the calls above.
                phase => return Err(OrchestratorError::Stalled { phase }),
            }
        }

        self.finish(&run, &layout, spec_path, deliverable, &journal)
    }

    /// COLLECTING. Returns the SPEC.md path when one was written.
    async fn collect(
        &self,
        run: &mut OrchestrationRun,
        journal: &mut Journal,
        layout: &RunLayout,
        request: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Utf8PathBuf>, OrchestratorError> {
        let mut audit_failure: Option<AuditError> = None;
        let collected = {
            let audit = &mut journal.audit;
            let failure = &mut audit_failure;
            self.collector
                .collect_with(request, cancel, |turn| {
                    match audit.append(AuditEntry::DialogTurn {
                        turn: turn.turn,
                        question: turn.question.clone(),
                        answer: turn.answer.clone(),
                        fallback: turn.fallback,
                    }) {
                        Ok(_) => ControlFlow::Continue(()),
                        Err(e) => {
                            *failure = Some(e);
                            ControlFlow::Break(())
                        }
                    }
                })
                .await
        };

        let spec = match collected {
            Ok(spec) => spec,
            Err(CollectError::Interrupted { turn }) => {
                return Err(match audit_failure {
                    Some(e) => e.into(),
                    None => OrchestratorError::Artifact {
                        reason: format!("dialog stopped after turn {turn}"),
                    },
                });
            }
            Err(CollectError::InvalidInput { reason }) => {
                warn!(%reason, "request rejected");
                journal.record(run, RunEvent::InvalidInput)?;
                return Ok(None);
            }
            Err(CollectError::Cancelled) => {
                journal.record(run, RunEvent::Cancelled)?;
                return Ok(None);
            }
        };

        let spec = Arc::new(spec);
        run.set_spec(Arc::clone(&spec));
        if !spec.is_complete() {
            journal.record(run, RunEvent::TurnLimitExceeded)?;
            return Ok(None);
        }

        let path = layout.spec_artifact();
        write_spec_artifact(&path, &spec).map_err(|e| OrchestratorError::Artifact {
            reason: format!("{e:#}"),
        })?;
        info!(
            statements = spec.statements().len(),
            digest = spec.digest(),
            "specification written"
        );
        journal.record(run, RunEvent::SpecComplete)?;
        Ok(Some(path))
    }

    /// GENERATING then VALIDATING for the current attempt.
    async fn generate_and_validate(
        &self,
        run: &mut OrchestrationRun,
        journal: &mut Journal,
        cancel: &CancellationToken,
    ) -> Result<(), OrchestratorError> {
        let Some(project) = self.generate(run, journal, cancel).await? else {
            return Ok(());
        };

        let validated = self
            .sandbox
            .validate_cancellable(&project, self.settings.sandbox_timeout, cancel)
            .instrument(info_span!("phase", phase = %RunPhase::Validating))
            .await;
        let report = match validated {
            Ok(report) => report,
            Err(ValidationCancelled) => {
                journal.record(run, RunEvent::Cancelled)?;
                return Ok(());
            }
        };

        let event = match report.verdict() {
            Verdict::Accepted => RunEvent::Accepted,
            Verdict::Rejected => RunEvent::Rejected,
            Verdict::SandboxError => RunEvent::SandboxError,
        };
        info!(summary = %report.summary(), "attempt validated");
        run.record_attempt(project, report)?;
        journal.record(run, event)?;
        Ok(())
    }

    /// One attempt's generation, with its single immediate retry. Returns
    /// `None` once the run has gone terminal.
    async fn generate(
        &self,
        run: &mut OrchestrationRun,
        journal: &mut Journal,
        cancel: &CancellationToken,
    ) -> Result<Option<GeneratedProject>, OrchestratorError> {
        let Some(spec) = run.spec().cloned() else {
            return Err(OrchestratorError::Stalled { phase: run.phase() });
        };

        let mut retried = false;
        loop {
            if cancel.is_cancelled() {
                journal.record(run, RunEvent::Cancelled)?;
                return Ok(None);
            }
            let generated = self.request_project(&spec, run, cancel).await;
            match generated {
                Ok(project) => {
                    debug!(files = project.len(), "project generated");
                    journal.record(run, RunEvent::ProjectProduced)?;
                    return Ok(Some(project));
                }
                Err(GenerationError::Cancelled) => {
                    journal.record(run, RunEvent::Cancelled)?;
                    return Ok(None);
                }
                Err(e) => {
                    let retryable = e.is_retryable() && !retried;
                    warn!(error = %e, retryable, "generation failed");
                    retried = true;
                    journal.record(run, RunEvent::GenerationFailed { retryable })?;
                    if !retryable {
                        return Ok(None);
                    }
                }
            }
        }
    }

    async fn request_project(
        &self,
        spec: &Arc<SpecDocument>,
        run: &OrchestrationRun,
        cancel: &CancellationToken,
    ) -> Result<GeneratedProject, GenerationError> {
        self.generator
            .generate(spec, run.attempt(), run.last_failures(), cancel)
            .await
    }

    /// PACKAGING. A failure never leaves a file at `dest`.
    fn package(&self, run: &OrchestrationRun, dest: &Utf8Path) -> bool {
        let Some((project, _)) = run.history().last() else {
            warn!("no accepted project to package");
            return false;
        };
        match self.packager.package(project, dest) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "packaging failed");
                if dest.exists()
                    && let Err(rm) = std::fs::remove_file(dest)
                {
                    warn!(error = %rm, path = %dest, "could not remove partial deliverable");
                }
                false
            }
        }
    }

    fn finish(
        &self,
        run: &OrchestrationRun,
        layout: &RunLayout,
        spec_path: Option<Utf8PathBuf>,
        deliverable: Option<Utf8PathBuf>,
        journal: &Journal,
    ) -> Result<RunOutcome, OrchestratorError> {
        let names = run.names();
        let report_path = layout.report_artifact();
        let json_path = layout.report_json();
        write_reports(
            &report_path,
            &json_path,
            &run.snapshot(&names, deliverable.as_deref()),
        )
        .map_err(|e| OrchestratorError::Artifact {
            reason: format!("{e:#}"),
        })?;

        let summary = run.history().last().map(|(_, r)| r.summary());
        match run.failure_reason() {
            Some(reason) => warn!(%reason, attempts = run.history().len(), "run failed"),
            None => info!(attempts = run.history().len(), "run done"),
        }

        Ok(RunOutcome {
            run_id: run.run_id().to_string(),
            final_phase: run.phase(),
            failure_reason: run.failure_reason(),
            attempts: u32::try_from(run.history().len()).unwrap_or(u32::MAX),
            artifacts: RunArtifacts {
                run_dir: layout.root().to_path_buf(),
                audit_log: journal.audit.path().to_path_buf(),
                spec: spec_path,
                report: Some(report_path),
                report_json: Some(json_path),
                deliverable,
            },
            summary,
        })
    }
}

/// Applies events to the run and makes each transition durable before the
/// next phase starts.
struct Journal {
    audit: AuditLog,
}

impl Journal {
    fn record(
        &mut self,
        run: &mut OrchestrationRun,
        event: RunEvent,
    ) -> Result<Transition, OrchestratorError> {
        let transition = run.apply(event)?;
        self.audit.append(AuditEntry::PhaseTransition {
            from: transition.from.to_string(),
            to: transition.to.to_string(),
            event: event.to_string(),
            attempt: transition.attempt,
        })?;
        info!(
            from = %transition.from,
            to = %transition.to,
            %event,
            attempt = transition.attempt,
            "phase transition"
        );
        Ok(transition)
    }
}
