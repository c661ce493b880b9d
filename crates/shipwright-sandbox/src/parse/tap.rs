//! Test Anything Protocol.
//!
//! Only top-level test points count; indented subtest output is ignored.
//! `# SKIP` is skipped whatever the result, `# TODO` failures are expected
//! and are skipped too. Diagnostic `#` lines after a `not ok` become its
//! message. `Bail out!` is recorded as a failure.

use once_cell::sync::Lazy;
use regex::Regex;
use shipwright_model::{FailureRecord, TestCounts};

use super::{ParsedRun, clip};

static TEST_POINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<not>not )?ok\b(?:\s+(?P<num>\d+))?(?:\s*-)?\s*(?P<desc>[^#]*?)\s*(?:#\s*(?P<directive>(?i:skip|todo))\b.*|#.*)?$",
    )
    .expect("valid regex")
});

static BAIL_OUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Bail out!\s*(?P<reason>.*)$").expect("valid regex"));

pub(super) fn parse(output: &str) -> ParsedRun {
    let mut counts = TestCounts::default();
    let mut failures: Vec<FailureRecord> = Vec::new();
    // Index into `failures` collecting diagnostics for the latest `not ok`.
    let mut open: Option<(usize, Vec<String>)> = None;
    let mut seen = 0u32;

    let close = |open: &mut Option<(usize, Vec<String>)>, failures: &mut Vec<FailureRecord>| {
        if let Some((idx, lines)) = open.take()
            && !lines.is_empty()
        {
            failures[idx].message = clip(&lines.join("\n"));
        }
    };

    for line in output.lines() {
        let line = line.trim_end();

        if let Some(caps) = TEST_POINT.captures(line) {
            close(&mut open, &mut failures);
            seen += 1;
            let failed = caps.name("not").is_some();
            let directive = caps
                .name("directive")
                .map(|d| d.as_str().to_ascii_lowercase());
            let id = test_id(&caps, seen);

            match (failed, directive.as_deref()) {
                (_, Some("skip")) | (true, Some("todo")) => counts.skipped += 1,
                (false, _) => counts.passed += 1,
                (true, _) => {
                    counts.failed += 1;
                    failures.push(FailureRecord::new(id, "not ok"));
                    open = Some((failures.len() - 1, Vec::new()));
                }
            }
        } else if let Some(caps) = BAIL_OUT.captures(line) {
            close(&mut open, &mut failures);
            counts.failed += 1;
            failures.push(FailureRecord::new("bail out", clip(&caps["reason"])));
        } else if let Some((_, lines)) = open.as_mut()
            && let Some(diag) = line.strip_prefix('#')
        {
            let diag = diag.trim();
            if !diag.is_empty() {
                lines.push(diag.to_string());
            }
        }
    }
    close(&mut open, &mut failures);

    ParsedRun { counts, failures }
}

fn test_id(caps: &regex::Captures<'_>, seen: u32) -> String {
    let desc = caps.name("desc").map_or("", |d| d.as_str());
    if !desc.is_empty() {
        return desc.to_string();
    }
    match caps.name("num") {
        Some(num) => format!("test {}", num.as_str()),
        None => format!("test {seen}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_results() {
        let output = "\
TAP version 13
1..5
ok 1 - adds numbers
not ok 2 - subtracts numbers
# expected 1, got 2
#   at test.sh line 4
ok 3 - divides # SKIP no zero handling yet
not ok 4 - multiplies # TODO not written
ok 5
";
        let run = parse(output);
        assert_eq!(run.counts, TestCounts::new(2, 1).with_skipped(2));
        assert_eq!(run.failures.len(), 1);
        assert_eq!(run.failures[0].test_id, "subtracts numbers");
        assert_eq!(
            run.failures[0].message,
            "expected 1, got 2\nat test.sh line 4"
        );
    }

    #[test]
    fn unnamed_failure_uses_number() {
        let run = parse("1..1\nnot ok 1\n");
        assert_eq!(run.failures[0].test_id, "test 1");
        assert_eq!(run.failures[0].message, "not ok");
    }

    #[test]
    fn bail_out_is_a_failure() {
        let run = parse("1..3\nok 1 - first\nBail out! database missing\n");
        assert_eq!(run.counts, TestCounts::new(1, 1));
        assert_eq!(run.failures[0].test_id, "bail out");
        assert_eq!(run.failures[0].message, "database missing");
    }

    #[test]
    fn indented_subtests_are_ignored() {
        let run = parse("    ok 1 - inner\nok 1 - outer\n");
        assert_eq!(run.counts, TestCounts::new(1, 0));
    }

    #[test]
    fn plain_comment_is_not_a_directive() {
        let run = parse("not ok 1 - parses input # see issue 12\n");
        assert_eq!(run.counts, TestCounts::new(0, 1));
        assert_eq!(run.failures[0].test_id, "parses input");
    }

    #[test]
    fn empty_output_has_no_tests() {
        assert_eq!(parse("").counts.total(), 0);
    }
}
