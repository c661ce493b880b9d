//! Outcome of running one project's test suite.

use serde::{Deserialize, Serialize};

/// Test identifier used for records the sandbox synthesises itself.
pub const SANDBOX_RECORD_ID: &str = "<sandbox>";
/// Test identifier used when the runner reported failures without naming them.
pub const SUITE_RECORD_ID: &str = "<suite>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Accepted,
    Rejected,
    SandboxError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub test_id: String,
    pub message: String,
}

impl FailureRecord {
    #[must_use]
    pub fn new(test_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            message: message.into(),
        }
    }
}

/// Parsed pass/fail tallies. `total` is derived, so `passed + failed ==
/// total` cannot be violated short of saturation at `u32::MAX`. Skipped
/// tests are tracked but not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    pub passed: u32,
    pub failed: u32,
    #[serde(default)]
    pub skipped: u32,
}

impl TestCounts {
    #[must_use]
    pub const fn new(passed: u32, failed: u32) -> Self {
        Self {
            passed,
            failed,
            skipped: 0,
        }
    }

    #[must_use]
    pub const fn with_skipped(mut self, skipped: u32) -> Self {
        self.skipped = skipped;
        self
    }

    #[must_use]
    pub const fn total(&self) -> u32 {
        self.passed.saturating_add(self.failed)
    }
}

/// Outcome of the optional static-analysis step. Informational only: it never
/// changes a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintSummary {
    /// `true` when the lint command ran and exited zero.
    pub clean: bool,
    pub exit_code: Option<i32>,
    pub summary: String,
    pub output_tail: String,
}

impl LintSummary {
    #[must_use]
    pub fn new(
        clean: bool,
        exit_code: Option<i32>,
        summary: impl Into<String>,
        output_tail: impl Into<String>,
    ) -> Self {
        Self {
            clean,
            exit_code,
            summary: summary.into(),
            output_tail: output_tail.into(),
        }
    }
}

/// Verdict plus the evidence behind it.
///
/// Built only through [`from_counts`](Self::from_counts) or
/// [`sandbox_error`](Self::sandbox_error), which keep the verdict and the
/// counts consistent: ACCEPTED and REJECTED always carry counts, a
/// SANDBOX_ERROR never does, and REJECTED always has at least one failure
/// record to carry into a repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    attempt: u32,
    verdict: Verdict,
    counts: Option<TestCounts>,
    failures: Vec<FailureRecord>,
    exit_code: Option<i32>,
    duration_ms: u64,
    output_tail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    lint: Option<LintSummary>,
}

impl ValidationReport {
    /// Derive the verdict from parsed results.
    ///
    /// A suite that ran but reported zero tests could not be meaningfully
    /// executed and becomes a SANDBOX_ERROR.
    #[must_use]
    pub fn from_counts(attempt: u32, counts: TestCounts, mut failures: Vec<FailureRecord>) -> Self {
        if counts.failed > 0 {
            if failures.is_empty() {
                failures.push(FailureRecord::new(
                    SUITE_RECORD_ID,
                    format!(
                        "{} test(s) failed without per-test detail",
                        counts.failed
                    ),
                ));
            }
            return Self::build(attempt, Verdict::Rejected, Some(counts), failures);
        }
        if counts.total() > 0 {
            return Self::build(attempt, Verdict::Accepted, Some(counts), Vec::new());
        }
        Self::sandbox_error(attempt, "test runner reported no executed tests")
    }

    /// The suite could not be executed; counts are undefined.
    #[must_use]
    pub fn sandbox_error(attempt: u32, reason: impl Into<String>) -> Self {
        Self::build(
            attempt,
            Verdict::SandboxError,
            None,
            vec![FailureRecord::new(SANDBOX_RECORD_ID, reason)],
        )
    }

    fn build(
        attempt: u32,
        verdict: Verdict,
        counts: Option<TestCounts>,
        failures: Vec<FailureRecord>,
    ) -> Self {
        Self {
            attempt,
            verdict,
            counts,
            failures,
            exit_code: None,
            duration_ms: 0,
            output_tail: String::new(),
            lint: None,
        }
    }

    /// Attach execution details gathered by the sandbox.
    #[must_use]
    pub fn with_execution(
        mut self,
        exit_code: Option<i32>,
        duration_ms: u64,
        output_tail: impl Into<String>,
    ) -> Self {
        self.exit_code = exit_code;
        self.duration_ms = duration_ms;
        self.output_tail = output_tail.into();
        self
    }

    #[must_use]
    pub fn with_lint(mut self, lint: Option<LintSummary>) -> Self {
        self.lint = lint;
        self
    }

    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub const fn verdict(&self) -> Verdict {
        self.verdict
    }

    #[must_use]
    pub const fn counts(&self) -> Option<TestCounts> {
        self.counts
    }

    #[must_use]
    pub fn total(&self) -> Option<u32> {
        self.counts.map(|c| c.total())
    }

    #[must_use]
    pub fn passed(&self) -> Option<u32> {
        self.counts.map(|c| c.passed)
    }

    #[must_use]
    pub fn failed(&self) -> Option<u32> {
        self.counts.map(|c| c.failed)
    }

    #[must_use]
    pub fn failures(&self) -> &[FailureRecord] {
        &self.failures
    }

    #[must_use]
    pub const fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    #[must_use]
    pub const fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    #[must_use]
    pub fn output_tail(&self) -> &str {
        &self.output_tail
    }

    #[must_use]
    pub const fn lint(&self) -> Option<&LintSummary> {
        self.lint.as_ref()
    }

    /// One-line human summary, e.g. `REJECTED: 3/4 passed, 1 failed`.
    #[must_use]
    pub fn summary(&self) -> String {
        match self.counts {
            Some(c) => format!(
                "{}: {}/{} passed, {} failed",
                self.verdict,
                c.passed,
                c.total(),
                c.failed
            ),
            None => {
                let reason = self
                    .failures
                    .first()
                    .map_or("unknown reason", |f| f.message.as_str());
                format!("{}: {reason}", self.verdict)
            }
        }
    }
}
