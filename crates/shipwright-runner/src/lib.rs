//! Process execution for shipwright.
//!
//! Every subprocess the pipeline starts (dependency installs, test suites,
//! the generation command) goes through [`run_bounded`]: argv-style
//! invocation, a hard wall-clock limit, cooperative cancellation, capped
//! output capture, and teardown of the child's whole process group.

mod command_spec;
mod error;
mod exec;
mod platform;
mod ring_buffer;

pub use command_spec::CommandSpec;
pub use error::RunnerError;
pub use exec::{ExecLimits, ProcessOutput, run_bounded};
pub use ring_buffer::RingBuffer;
