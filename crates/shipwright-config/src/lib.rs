//! Configuration for shipwright.
//!
//! Precedence is CLI > `.shipwright/config.toml` > built-in defaults, with
//! every resolved value remembering where it came from.

mod config;
mod error;

pub use config::*;
pub use error::ConfigError;
