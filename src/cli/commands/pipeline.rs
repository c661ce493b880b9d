//! `shipwright run`

use std::sync::Arc;

use shipwright_config::Config;
use shipwright_orchestrator::{Orchestrator, RunOutcome};
use shipwright_phases::{CommandSynthesizer, StdioDialog};
use shipwright_utils::{CancellationToken, ExitCode};

use crate::error::ShipwrightError;

pub(crate) async fn execute(
    config: &Config,
    request: &str,
    cancel: &CancellationToken,
) -> Result<ExitCode, ShipwrightError> {
    let generator = config.require_generator()?.to_vec();
    let synthesizer = CommandSynthesizer::new(generator, config.generator_timeout());
    let orchestrator =
        Orchestrator::from_config(config, Arc::new(StdioDialog::new()), Arc::new(synthesizer))?;

    let outcome = orchestrator.execute(request, cancel).await?;
    print_outcome(&outcome);
    if let Some(reason) = outcome.failure_reason {
        eprintln!("shipwright: run failed: {reason}");
    }
    Ok(outcome.exit_code())
}

fn print_outcome(outcome: &RunOutcome) {
    let status = if outcome.is_success() { "✓" } else { "✗" };
    println!("{status} Run {} finished in {}", outcome.run_id, outcome.final_phase);
    if let Some(reason) = outcome.failure_reason {
        println!("  Reason: {reason}");
    }
    println!("  Attempts validated: {}", outcome.attempts);
    if let Some(summary) = &outcome.summary {
        println!("  Last verdict: {summary}");
    }

    let artifacts = &outcome.artifacts;
    println!("  Run directory: {}", artifacts.run_dir);
    if let Some(spec) = &artifacts.spec {
        println!("  Specification: {spec}");
    }
    if let Some(report) = &artifacts.report {
        println!("  Report: {report}");
    }
    if let Some(deliverable) = &artifacts.deliverable {
        println!("  Deliverable: {deliverable}");
    }
    println!("  Audit log: {}", artifacts.audit_log);
}
