//! Validation sandbox: materialise a generated project into a fresh
//! directory, install its dependencies, optionally lint it, run its tests as
//! a bounded subprocess, and turn the output into a [`ValidationReport`].
//!
//! Isolation is directory scoping plus a process boundary (own process
//! group, scrubbed environment, `HOME`/`TMPDIR` and the pip install target
//! inside the working directory). It contains test-execution failures; it is not a security
//! boundary against hostile code.
//!
//! [`ValidationReport`]: shipwright_model::ValidationReport

mod error;
mod install;
mod lint;
pub mod parse;
mod sandbox;
mod workdir;

pub use error::SandboxSetupError;
pub use parse::{ParsedRun, parse_output};
pub use sandbox::{SandboxConfig, ValidationCancelled, ValidationSandbox};
