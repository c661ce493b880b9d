//! Tracing setup for the CLI.
//!
//! Two sinks: a compact human layer on stderr whose level follows `--verbose`
//! (or `RUST_LOG`), and an optional append-only debug file shared by every
//! run in a state directory. Run and phase spans carry `run_id` and `phase`,
//! so interleaved lines from concurrent runs stay attributable.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::sync::Mutex;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

fn use_color() -> bool {
    std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

fn console_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("shipwright=debug,info")
            } else {
                EnvFilter::try_new("shipwright=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Calling this twice returns an error from `try_init`; tests that need
/// logging should use [`init_test_tracing`] instead.
pub fn init_tracing(verbose: bool, log_file: Option<&Utf8Path>) -> Result<()> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(use_color())
        .with_target(verbose)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_span_events(if verbose {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        })
        .compact()
        .with_filter(console_filter(verbose));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create log directory: {parent}"))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {path}"))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(true)
                    .with_filter(EnvFilter::new("shipwright=debug,warn")),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}

/// Best-effort subscriber for tests; ignores "already installed".
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("shipwright=debug"))
        .with_test_writer()
        .try_init();
}
