//! CLI entry point and dispatch
//!
//! `run()` parses arguments, discovers configuration, installs tracing,
//! builds the tokio runtime, and prints every error itself. main.rs only
//! turns the returned code into a process exit.

use std::time::Duration;

use clap::Parser;
use shipwright_config::Config;
use shipwright_utils::{CancellationToken, ExitCode, paths};
use tracing::{debug, warn};

use super::args::{Cli, Commands};
use super::commands;
use crate::error::ShipwrightError;

/// Upper bound on waiting for leftover runtime tasks once a command returns.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let config = match Config::discover(&cli.config_overrides()) {
        Ok(config) => config,
        Err(err) => return Err(report(&ShipwrightError::ConfigLoad(err))),
    };

    let log_file = paths::log_file(&config.run.state_dir);
    let log_target = matches!(cli.command, Commands::Run { .. }).then_some(log_file.as_path());
    if let Err(e) = shipwright_utils::logging::init_tracing(cli.verbose, log_target) {
        eprintln!("warning: logging disabled: {e:#}");
    }
    debug!(config = ?config.config_path, "configuration loaded");

    let code = match cli.command {
        Commands::Config => commands::config::execute(&config),
        Commands::Clean { force } => commands::clean::execute(&config, force),
        Commands::Run { request, .. } => with_runtime(|cancel| async move {
            commands::pipeline::execute(&config, &request, &cancel).await
        }),
        Commands::Validate { dir, .. } => with_runtime(|cancel| async move {
            commands::validate::execute(&config, &dir, &cancel).await
        }),
    };

    match code {
        Ok(code) if code.is_success() => Ok(()),
        Ok(code) => Err(code),
        Err(err) => Err(report(&err)),
    }
}

/// Run `body` on a fresh runtime, with Ctrl-C wired to its cancellation token.
fn with_runtime<F, Fut>(body: F) -> Result<ExitCode, ShipwrightError>
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = Result<ExitCode, ShipwrightError>>,
{
    let rt = tokio::runtime::Runtime::new().map_err(|e| ShipwrightError::Runtime(e.to_string()))?;
    let cancel = CancellationToken::new();
    let result = rt.block_on(async {
        let watcher = match interrupt_listener() {
            Ok(interrupted) => {
                let cancel = cancel.clone();
                Some(tokio::spawn(async move {
                    if interrupted.await {
                        eprintln!("\nInterrupted; stopping at the next safe point...");
                        cancel.cancel();
                    }
                }))
            }
            Err(e) => {
                warn!(error = %e, "Ctrl-C handling unavailable");
                None
            }
        };
        let result = body(cancel).await;
        if let Some(watcher) = watcher {
            watcher.abort();
        }
        result
    });
    rt.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    result
}

/// Register for SIGINT now, so an interrupt that lands before the watcher
/// task is first polled still cancels the run.
#[cfg(unix)]
fn interrupt_listener() -> std::io::Result<impl Future<Output = bool> + Send + 'static> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    Ok(async move { sigint.recv().await.is_some() })
}

#[cfg(not(unix))]
fn interrupt_listener() -> std::io::Result<impl Future<Output = bool> + Send + 'static> {
    Ok(async { tokio::signal::ctrl_c().await.is_ok() })
}

fn report(err: &ShipwrightError) -> ExitCode {
    eprint!("{}", err.display_for_user());
    err.to_exit_code()
}
