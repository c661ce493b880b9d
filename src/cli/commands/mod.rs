//! Subcommand implementations. Each returns the exit code to use on
//! success paths and a [`ShipwrightError`](crate::ShipwrightError) otherwise.

pub(super) mod clean;
pub(super) mod config;
pub(super) mod pipeline;
pub(super) mod validate;
