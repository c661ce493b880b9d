//! Test-runner output parsers.

mod pytest;
mod tap;

use shipwright_config::OutputFormat;
use shipwright_model::{FailureRecord, TestCounts};

/// Longest failure message kept per record.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// Tallies and failure records extracted from one run's output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedRun {
    pub counts: TestCounts,
    pub failures: Vec<FailureRecord>,
}

#[must_use]
pub fn parse_output(format: OutputFormat, output: &str) -> ParsedRun {
    match format {
        OutputFormat::Pytest => pytest::parse(output),
        OutputFormat::Tap => tap::parse(output),
    }
}

fn clip(message: &str) -> String {
    shipwright_utils::text::head_chars(message.trim(), MAX_MESSAGE_CHARS)
}
