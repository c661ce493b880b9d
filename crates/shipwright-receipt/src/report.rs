//! `VALIDATION.md` and its machine-readable companion `report.json`.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use camino::Utf8Path;
use chrono::{DateTime, Utc};
use serde::Serialize;
use shipwright_model::{
    FailureRecord, GeneratedProject, LintSummary, SpecDocument, TestCounts, ValidationReport,
    Verdict,
};
use shipwright_utils::write_file_atomic;

/// Borrowed view of a finished run, enough to render both report files.
#[derive(Debug, Clone, Copy)]
pub struct RunSnapshot<'a> {
    pub run_id: &'a str,
    /// `DONE` or `FAILED`.
    pub final_phase: &'a str,
    pub failure_reason: Option<&'a str>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub max_attempts: u32,
    pub spec: Option<&'a SpecDocument>,
    pub history: &'a [(GeneratedProject, ValidationReport)],
    pub deliverable: Option<&'a Utf8Path>,
}

impl RunSnapshot<'_> {
    fn last(&self) -> Option<&(GeneratedProject, ValidationReport)> {
        self.history.last()
    }
}

#[derive(Serialize)]
struct ReportJson<'a> {
    run_id: &'a str,
    final_phase: &'a str,
    failure_reason: Option<&'a str>,
    started_at: String,
    finished_at: Option<String>,
    max_attempts: u32,
    spec_digest: Option<&'a str>,
    spec_complete: Option<bool>,
    deliverable: Option<&'a str>,
    attempts: Vec<AttemptJson<'a>>,
}

#[derive(Serialize)]
struct AttemptJson<'a> {
    attempt: u32,
    verdict: Verdict,
    counts: Option<TestCounts>,
    failures: &'a [FailureRecord],
    exit_code: Option<i32>,
    duration_ms: u64,
    files: usize,
    spec_digest: &'a str,
    lint: Option<&'a LintSummary>,
}

/// Canonical JSON (RFC 8785) for `report.json`.
pub fn emit_report_jcs(run: &RunSnapshot<'_>) -> Result<String> {
    let doc = ReportJson {
        run_id: run.run_id,
        final_phase: run.final_phase,
        failure_reason: run.failure_reason,
        started_at: run.started_at.to_rfc3339(),
        finished_at: run.finished_at.map(|t| t.to_rfc3339()),
        max_attempts: run.max_attempts,
        spec_digest: run.spec.map(SpecDocument::digest),
        spec_complete: run.spec.map(SpecDocument::is_complete),
        deliverable: run.deliverable.map(Utf8Path::as_str),
        attempts: run
            .history
            .iter()
            .map(|(project, report)| AttemptJson {
                attempt: report.attempt(),
                verdict: report.verdict(),
                counts: report.counts(),
                failures: report.failures(),
                exit_code: report.exit_code(),
                duration_ms: report.duration_ms(),
                files: project.len(),
                spec_digest: project.spec_digest(),
                lint: report.lint(),
            })
            .collect(),
    };
    let json_value =
        serde_json::to_value(&doc).with_context(|| "Failed to serialize report to JSON value")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize report JSON")?;
    String::from_utf8(json_bytes).with_context(|| "Failed to convert canonical JSON to UTF-8 string")
}

#[must_use]
pub fn render_validation_markdown(run: &RunSnapshot<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Validation Report\n");

    let _ = writeln!(out, "## Executive Summary\n");
    let _ = writeln!(out, "- Run: `{}`", run.run_id);
    match run.failure_reason {
        Some(reason) => {
            let _ = writeln!(out, "- Outcome: **{}** ({reason})", run.final_phase);
        }
        None => {
            let _ = writeln!(out, "- Outcome: **{}**", run.final_phase);
        }
    }
    let _ = writeln!(
        out,
        "- Attempts: {} of {}",
        run.history.len(),
        run.max_attempts
    );
    if let Some((_, report)) = run.last() {
        let _ = writeln!(out, "- Final verdict: {}", report.summary());
    }
    if let Some(spec) = run.spec {
        let _ = writeln!(out, "- Specification digest: `{}`", spec.digest());
    }
    let _ = writeln!(out, "- Started: {}", run.started_at.to_rfc3339());
    if let Some(finished) = run.finished_at {
        let _ = writeln!(out, "- Finished: {}", finished.to_rfc3339());
    }
    if let Some(path) = run.deliverable {
        let _ = writeln!(out, "- Deliverable: `{path}`");
    }
    out.push('\n');

    let _ = writeln!(out, "## Test Results\n");
    if run.history.is_empty() {
        let _ = writeln!(out, "No test run completed.\n");
    } else {
        let _ = writeln!(out, "| Attempt | Verdict | Passed | Failed | Skipped | Total | Duration |");
        let _ = writeln!(out, "|---|---|---|---|---|---|---|");
        for (_, report) in run.history {
            let cell = |v: Option<u32>| v.map_or_else(|| "-".to_string(), |n| n.to_string());
            let counts = report.counts();
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} | {} | {} ms |",
                report.attempt(),
                report.verdict(),
                cell(counts.map(|c| c.passed)),
                cell(counts.map(|c| c.failed)),
                cell(counts.map(|c| c.skipped)),
                cell(counts.map(|c| c.total())),
                report.duration_ms()
            );
        }
        out.push('\n');
    }

    let _ = writeln!(out, "## Failures\n");
    match run.last().map(|(_, r)| r.failures()) {
        Some(failures) if !failures.is_empty() => {
            for failure in failures {
                let _ = writeln!(
                    out,
                    "- `{}`: {}",
                    failure.test_id,
                    failure.message.replace('\n', " ")
                );
            }
            out.push('\n');
        }
        _ => {
            let _ = writeln!(out, "None.\n");
        }
    }

    let _ = writeln!(out, "## Static Analysis\n");
    match run.last().map(|(_, r)| r.lint()) {
        Some(Some(lint)) => {
            let status = if lint.clean { "clean" } else { "issues found" };
            let _ = writeln!(out, "- Result: {status}");
            let _ = writeln!(out, "- {}", lint.summary);
            if !lint.output_tail.is_empty() {
                let _ = writeln!(out, "\n```text\n{}\n```", lint.output_tail.trim_end());
            }
            out.push('\n');
        }
        _ => {
            let _ = writeln!(out, "Not run.\n");
        }
    }

    let _ = writeln!(out, "## Attempt History\n");
    if run.history.is_empty() {
        let _ = writeln!(out, "No attempts reached validation.\n");
    } else {
        for (project, report) in run.history {
            let roles = project
                .role_counts()
                .iter()
                .map(|(role, n)| format!("{n} {role}"))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                out,
                "{}. {} ({} files: {roles})",
                report.attempt(),
                report.summary(),
                project.len()
            );
        }
        out.push('\n');
    }

    let _ = writeln!(out, "## Project Structure\n");
    match run.last() {
        Some((project, _)) => {
            let _ = writeln!(out, "```text\n{}```", project.tree());
        }
        None => {
            let _ = writeln!(out, "No project was generated.");
        }
    }
    out
}

/// Write `VALIDATION.md` and `report.json` atomically.
pub fn write_reports(markdown_path: &Utf8Path, json_path: &Utf8Path, run: &RunSnapshot<'_>) -> Result<()> {
    write_file_atomic(markdown_path, &render_validation_markdown(run))
        .with_context(|| format!("Failed to write report artifact: {markdown_path}"))?;
    let json = emit_report_jcs(run)?;
    write_file_atomic(json_path, &json)
        .with_context(|| format!("Failed to write report JSON: {json_path}"))?;
    Ok(())
}
