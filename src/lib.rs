//! shipwright turns a natural-language project request into a tested,
//! packaged deliverable.
//!
//! A run moves through a fixed state machine:
//!
//! ```text
//! COLLECTING -> GENERATING -> VALIDATING -> PACKAGING -> DONE
//!                   ^             |
//!                   +- REPAIRING -+            (any) -> FAILED
//! ```
//!
//! The workspace crates each own one concern; this crate re-exports the
//! pieces an embedder needs and hosts the CLI.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use shipwright::{CancellationToken, CliArgs, CommandSynthesizer, Config, Orchestrator, StdioDialog};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = Config::discover(&CliArgs::default())?;
//! let synthesizer = CommandSynthesizer::new(
//!     config.require_generator()?.to_vec(),
//!     config.generator_timeout(),
//! );
//! let orchestrator =
//!     Orchestrator::from_config(&config, Arc::new(StdioDialog::new()), Arc::new(synthesizer))?;
//! let outcome = orchestrator
//!     .execute("add two numbers and print the sum", &CancellationToken::new())
//!     .await?;
//! println!("{:?}", outcome.final_phase);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod error;

pub use error::ShipwrightError;

pub use shipwright_config::{CliArgs, Config, ConfigError, ConfigSource, OutputFormat};
pub use shipwright_model::{
    FailureKind, FailureRecord, FileClassifier, GeneratedProject, Requirement, SpecDocument,
    TestCounts, ValidationReport, Verdict,
};
pub use shipwright_orchestrator::{
    FailureReason, Orchestrator, OrchestratorError, OrchestratorSettings, RunEvent, RunOutcome,
    RunPhase, decide,
};
pub use shipwright_phases::{
    CommandSynthesizer, Dialog, Packager, StdioDialog, Synthesizer, ZipPackager,
};
pub use shipwright_sandbox::{SandboxConfig, ValidationSandbox};
pub use shipwright_utils::{CancellationToken, ExitCode};
