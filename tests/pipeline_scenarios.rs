//! End-to-end runs of the orchestrator with scripted collaborators.
//!
//! The dialog and the generator are scripted; the sandbox is real and runs
//! `sh tests/run.sh` from the generated project, which prints TAP. Each test
//! checks the terminal phase, the attempt history as seen by the generator,
//! the artifacts on disk, and that no sandbox directory is left behind.

#![cfg(unix)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Harness, four_passing, tap_project, three_of_four};
use shipwright::{FailureReason, OutputFormat, RunPhase};
use shipwright_phases::SynthesisError;
use shipwright_phases::testing::{FailingPackager, ScriptedSynthesizer};
use shipwright_receipt::{AuditEntry, AuditLog};
use shipwright_utils::CancellationToken;

const TIMEOUT: Duration = Duration::from_secs(30);

fn transitions(audit: &camino::Utf8Path) -> Vec<(String, String, u32)> {
    AuditLog::read_all(audit)
        .unwrap()
        .into_iter()
        .filter_map(|r| match r.entry {
            AuditEntry::PhaseTransition { to, event, attempt, .. } => Some((to, event, attempt)),
            AuditEntry::DialogTurn { .. } => None,
        })
        .collect()
}

#[tokio::test]
async fn scenario_a_two_turns_then_accepted() {
    let h = Harness::new(
        &["print the sum of two integers", "unit tests for positive and negative numbers"],
        ScriptedSynthesizer::new(vec![Ok(four_passing())]),
    );

    let outcome = h
        .orchestrator(3, TIMEOUT)
        .execute("add two numbers and print the sum", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.final_phase, RunPhase::Done, "{outcome:?}");
    assert_eq!(outcome.summary.as_deref(), Some("ACCEPTED: 4/4 passed, 0 failed"));
    assert_eq!(h.dialog.questions().len(), 2);
    assert_eq!(h.synth.calls(), 1);

    let deliverable = outcome.artifacts.deliverable.as_ref().unwrap();
    let archive = zip::ZipArchive::new(std::fs::File::open(deliverable).unwrap()).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort_unstable();
    assert_eq!(names, vec!["README.md", "adder.py", "tests/run.sh"]);

    let spec = std::fs::read_to_string(outcome.artifacts.spec.as_ref().unwrap()).unwrap();
    assert!(spec.contains("1. [user] add two numbers and print the sum"));
    assert!(spec.contains("[user] print the sum of two integers"));

    let records = AuditLog::read_all(&outcome.artifacts.audit_log).unwrap();
    let turns = records
        .iter()
        .filter(|r| matches!(r.entry, AuditEntry::DialogTurn { .. }))
        .count();
    assert_eq!(turns, 2);
    let seqs: Vec<u64> = records.iter().map(|r| r.seq).collect();
    assert_eq!(seqs, (1..=records.len() as u64).collect::<Vec<_>>());

    assert_eq!(h.leftover_workdirs(), 0);
}

#[tokio::test]
async fn scenario_b_empty_generation_is_retried_on_the_same_attempt() {
    let h = Harness::new(
        &["sum", "proceed"],
        ScriptedSynthesizer::new(vec![Ok(Default::default()), Ok(four_passing())]),
    );

    let outcome = h
        .orchestrator(3, TIMEOUT)
        .execute("add two numbers", &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_success(), "{outcome:?}");
    let attempts: Vec<u32> = h.synth.requests().iter().map(|r| r.attempt).collect();
    assert_eq!(attempts, vec![1, 1]);
    assert_eq!(outcome.attempts, 1);

    let path = transitions(&outcome.artifacts.audit_log);
    let events: Vec<&str> = path.iter().map(|(_, e, _)| e.as_str()).collect();
    assert_eq!(
        events,
        vec![
            "spec_complete",
            "generation_failed",
            "project_produced",
            "accepted",
            "packaged"
        ]
    );
    assert_eq!(path[1].0, "GENERATING");
}

#[tokio::test]
async fn scenario_c_rejection_is_repaired_with_prior_failures() {
    let h = Harness::new(
        &["sum", "proceed"],
        ScriptedSynthesizer::new(vec![Ok(three_of_four()), Ok(four_passing())]),
    );

    let outcome = h
        .orchestrator(3, TIMEOUT)
        .execute("add two numbers", &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(outcome.attempts, 2);

    let requests = h.synth.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].prior_failures.is_empty());
    assert_eq!(requests[1].attempt, 2);
    assert_eq!(requests[1].prior_failures.len(), 1);
    assert_eq!(requests[1].prior_failures[0].test_id, "negatives");
    assert_eq!(requests[1].prior_failures[0].message, "expected -1, got 1");
    assert_eq!(requests[0].spec_digest, requests[1].spec_digest);

    let report = std::fs::read_to_string(outcome.artifacts.report.as_ref().unwrap()).unwrap();
    assert!(report.contains("| 1 | REJECTED | 3 | 1 | 0 | 4 |"));
    assert!(report.contains("| 2 | ACCEPTED | 4 | 0 | 0 | 4 |"));

    let attempts: Vec<u32> = transitions(&outcome.artifacts.audit_log)
        .iter()
        .map(|(_, _, a)| *a)
        .collect();
    assert!(attempts.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(h.leftover_workdirs(), 0);
}

#[tokio::test]
async fn scenario_d_timeout_fails_without_repair() {
    let h = Harness::new(
        &["sum", "proceed"],
        ScriptedSynthesizer::new(vec![
            Ok(ScriptedSynthesizer::files(&[
                ("adder.py", "x = 1\n"),
                ("tests/run.sh", "echo 'ok 1 - starts'\nsleep 30\n"),
            ])),
            Ok(four_passing()),
        ]),
    );

    let outcome = h
        .orchestrator(3, Duration::from_millis(500))
        .execute("add two numbers", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.final_phase, RunPhase::Failed);
    assert_eq!(outcome.failure_reason, Some(FailureReason::SandboxFailure));
    assert_eq!(outcome.exit_code().as_i32(), 7);
    assert_eq!(h.synth.calls(), 1);
    assert!(outcome.artifacts.deliverable.is_none());
    assert!(!outcome.artifacts.run_dir.join("deliverable.zip").exists());
    assert_eq!(h.leftover_workdirs(), 0);

    let report = std::fs::read_to_string(outcome.artifacts.report.as_ref().unwrap()).unwrap();
    assert!(report.contains("(sandbox failure)"));
    assert!(report.contains("timed out"));
}

#[tokio::test]
async fn single_attempt_rejection_is_exhausted_immediately() {
    let h = Harness::new(
        &["sum", "proceed"],
        ScriptedSynthesizer::new(vec![Ok(three_of_four()), Ok(four_passing())]),
    );

    let outcome = h
        .orchestrator(1, TIMEOUT)
        .execute("add two numbers", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.failure_reason, Some(FailureReason::ValidationExhausted));
    assert_eq!(h.synth.calls(), 1);
    let last = transitions(&outcome.artifacts.audit_log).pop().unwrap();
    assert_eq!(last, ("FAILED".to_string(), "rejected".to_string(), 1));
}

#[tokio::test]
async fn repeated_rejection_stops_at_the_attempt_limit() {
    let h = Harness::new(
        &["sum", "proceed"],
        ScriptedSynthesizer::new(vec![
            Ok(three_of_four()),
            Ok(three_of_four()),
            Ok(three_of_four()),
            Ok(four_passing()),
        ]),
    );

    let outcome = h
        .orchestrator(3, TIMEOUT)
        .execute("add two numbers", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.failure_reason, Some(FailureReason::ValidationExhausted));
    assert_eq!(outcome.attempts, 3);
    let attempts: Vec<u32> = h.synth.requests().iter().map(|r| r.attempt).collect();
    assert_eq!(attempts, vec![1, 2, 3]);
}

#[tokio::test]
async fn packaging_failure_leaves_no_deliverable() {
    let h = Harness::new(
        &["sum", "proceed"],
        ScriptedSynthesizer::new(vec![Ok(four_passing())]),
    );
    let orchestrator = h.orchestrator_with(
        h.sandbox(common::TAP_COMMAND, OutputFormat::Tap),
        Arc::new(FailingPackager),
        3,
        TIMEOUT,
    );

    let outcome = orchestrator
        .execute("add two numbers", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.failure_reason, Some(FailureReason::PackagingFailed));
    assert_eq!(outcome.exit_code().as_i32(), 8);
    assert!(outcome.artifacts.deliverable.is_none());
    assert!(!outcome.artifacts.run_dir.join("deliverable.zip").exists());
    assert!(outcome.artifacts.report.as_ref().unwrap().is_file());
}

#[tokio::test]
async fn incomplete_requirements_never_reach_the_generator() {
    let h = Harness::new(&["sum"], ScriptedSynthesizer::new(vec![Ok(four_passing())]));

    let outcome = h
        .orchestrator(3, TIMEOUT)
        .execute("add two numbers", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.failure_reason, Some(FailureReason::RequirementsIncomplete));
    assert_eq!(h.synth.calls(), 0);
    assert!(outcome.artifacts.spec.is_none());
    assert!(!AuditLog::read_all(&outcome.artifacts.audit_log).unwrap().is_empty());
}

#[tokio::test]
async fn collaborator_failure_twice_fails_generation() {
    let h = Harness::new(
        &["sum", "proceed"],
        ScriptedSynthesizer::new(vec![
            Err(SynthesisError::Failed("generator exited with code 1".to_string())),
            Err(SynthesisError::Malformed("no files".to_string())),
        ]),
    );

    let outcome = h
        .orchestrator(3, TIMEOUT)
        .execute("add two numbers", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.failure_reason, Some(FailureReason::GenerationFailed));
    assert_eq!(outcome.exit_code().as_i32(), 5);
    assert_eq!(outcome.attempts, 0);
    let report = std::fs::read_to_string(outcome.artifacts.report.as_ref().unwrap()).unwrap();
    assert!(report.contains("No project was generated."));
}

#[tokio::test]
async fn cancellation_during_validation_cleans_up() {
    let h = Harness::new(
        &["sum", "proceed"],
        ScriptedSynthesizer::new(vec![Ok(ScriptedSynthesizer::files(&[
            ("adder.py", "x = 1\n"),
            ("tests/run.sh", "sleep 30\n"),
        ]))]),
    );
    let orchestrator = h.orchestrator(3, TIMEOUT);
    let cancel = CancellationToken::new();

    let trigger = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(300)).await;
            cancel.cancel();
        })
    };
    let started = std::time::Instant::now();
    let outcome = orchestrator.execute("add two numbers", &cancel).await.unwrap();
    trigger.await.unwrap();

    assert_eq!(outcome.failure_reason, Some(FailureReason::Cancelled));
    assert_eq!(outcome.exit_code().as_i32(), 130);
    assert!(started.elapsed() < Duration::from_secs(20));
    assert_eq!(h.leftover_workdirs(), 0);
    assert!(outcome.artifacts.report.as_ref().unwrap().is_file());
}

#[tokio::test]
async fn every_terminal_run_has_report_and_audit() {
    let cases: Vec<(Vec<&str>, ScriptedSynthesizer, &str)> = vec![
        (vec!["sum", "proceed"], ScriptedSynthesizer::new(vec![Ok(four_passing())]), "add"),
        (vec![], ScriptedSynthesizer::new(vec![]), ""),
        (
            vec!["sum", "proceed"],
            ScriptedSynthesizer::new(vec![Ok(tap_project("1..1\nnot ok 1 - broken"))]),
            "add",
        ),
    ];

    for (answers, synth, request) in cases {
        let h = Harness::new(&answers, synth);
        let outcome = h
            .orchestrator(1, TIMEOUT)
            .execute(request, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.final_phase.is_terminal());
        assert!(outcome.artifacts.report.as_ref().unwrap().is_file());
        assert!(outcome.artifacts.report_json.as_ref().unwrap().is_file());
        assert!(!AuditLog::read_all(&outcome.artifacts.audit_log).unwrap().is_empty());
        if !outcome.is_success() {
            assert!(!outcome.artifacts.run_dir.join("deliverable.zip").exists());
        }
    }
}
