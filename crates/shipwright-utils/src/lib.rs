//! Foundation utilities shared by every shipwright crate.
//!
//! Nothing in here knows about phases or verdicts; it is the plumbing the
//! rest of the workspace stands on (atomic writes, exit codes, logging,
//! cancellation and the on-disk run layout).

pub mod atomic_write;
pub mod cancel;
pub mod exit_codes;
pub mod logging;
pub mod paths;
pub mod text;

pub use atomic_write::{write_atomic_with, write_file_atomic};
pub use cancel::CancellationToken;
pub use exit_codes::ExitCode;
pub use paths::RunLayout;
