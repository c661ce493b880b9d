//! Command-line interface for shipwright
//!
//! - `args`: clap definitions
//! - `run`: entry point and dispatch
//! - `commands`: one module per subcommand

pub mod args;
mod commands;
mod run;

pub use args::{Cli, Commands};
pub use run::run;
