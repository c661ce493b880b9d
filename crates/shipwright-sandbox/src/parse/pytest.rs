//! `pytest -v` output.
//!
//! Three sources are merged: per-test verbose lines, the "short test
//! summary info" block (which also names collection errors), and the final
//! `N passed, M failed in 0.1s` line, used only when neither of the first two
//! produced anything.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use shipwright_model::{FailureRecord, TestCounts};

use super::{ParsedRun, clip};

static VERBOSE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<id>\S+::\S+)\s+(?P<status>PASSED|FAILED|ERROR|SKIPPED|XFAIL|XPASS)\b")
        .expect("valid regex")
});

// pytest-xdist prints `[gw0] [ 50%] PASSED tests/test_x.py::test_y`.
static XDIST_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\[gw\d+\]\s+\[\s*\d+%\]\s+(?P<status>PASSED|FAILED|ERROR|SKIPPED|XFAIL|XPASS)\s+(?P<id>\S+)",
    )
    .expect("valid regex")
});

static SHORT_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<status>FAILED|ERROR)\s+(?P<id>\S+)(?:\s+-\s+(?P<msg>.*))?$")
        .expect("valid regex")
});

static FINAL_SUMMARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^=*\s*(?P<body>\d+ \w+(?:, \d+ \w+)*) in [\d.]+s").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Passed,
    Failed,
    Skipped,
}

impl Status {
    fn from_word(word: &str) -> Self {
        match word {
            "PASSED" | "XPASS" => Self::Passed,
            "FAILED" | "ERROR" => Self::Failed,
            _ => Self::Skipped,
        }
    }
}

#[derive(Default)]
struct Outcomes {
    // First-seen order for stable failure records.
    order: Vec<String>,
    status: BTreeMap<String, Status>,
    messages: BTreeMap<String, String>,
}

impl Outcomes {
    /// A failure (e.g. teardown ERROR after PASSED) always wins.
    fn record(&mut self, id: &str, status: Status) {
        match self.status.get_mut(id) {
            Some(existing) => {
                if status == Status::Failed || *existing == Status::Skipped {
                    *existing = status;
                }
            }
            None => {
                self.order.push(id.to_string());
                self.status.insert(id.to_string(), status);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    fn into_run(self) -> ParsedRun {
        let mut counts = TestCounts::default();
        let mut failures = Vec::new();
        for id in &self.order {
            match self.status[id] {
                Status::Passed => counts.passed += 1,
                Status::Skipped => counts.skipped += 1,
                Status::Failed => {
                    counts.failed += 1;
                    let message = self
                        .messages
                        .get(id)
                        .map_or_else(|| "test failed".to_string(), |m| clip(m));
                    failures.push(FailureRecord::new(id.clone(), message));
                }
            }
        }
        ParsedRun { counts, failures }
    }
}

pub(super) fn parse(output: &str) -> ParsedRun {
    let mut outcomes = Outcomes::default();
    let mut final_counts = None;

    for line in output.lines() {
        let line = line.trim_end();
        if let Some(caps) = VERBOSE_LINE
            .captures(line)
            .or_else(|| XDIST_LINE.captures(line))
        {
            outcomes.record(&caps["id"], Status::from_word(&caps["status"]));
        } else if let Some(caps) = SHORT_SUMMARY.captures(line) {
            let id = &caps["id"];
            outcomes.record(id, Status::Failed);
            if let Some(msg) = caps.name("msg") {
                outcomes
                    .messages
                    .insert(id.to_string(), msg.as_str().to_string());
            } else if &caps["status"] == "ERROR" {
                outcomes
                    .messages
                    .entry(id.to_string())
                    .or_insert_with(|| "error collecting or setting up test".to_string());
            }
        } else if let Some(caps) = FINAL_SUMMARY.captures(line) {
            final_counts = Some(summary_counts(&caps["body"]));
        }
    }

    if !outcomes.is_empty() {
        return outcomes.into_run();
    }
    ParsedRun {
        counts: final_counts.unwrap_or_default(),
        failures: Vec::new(),
    }
}

fn summary_counts(body: &str) -> TestCounts {
    let mut counts = TestCounts::default();
    for part in body.split(", ") {
        let Some((n, word)) = part.split_once(' ') else {
            continue;
        };
        let Ok(n) = n.parse::<u64>() else {
            continue;
        };
        let n = u32::try_from(n).unwrap_or(u32::MAX);
        match word {
            "passed" | "xpassed" => counts.passed = counts.passed.saturating_add(n),
            "failed" | "error" | "errors" => counts.failed = counts.failed.saturating_add(n),
            "skipped" | "xfailed" => counts.skipped = counts.skipped.saturating_add(n),
            _ => {}
        }
    }
    counts
}
