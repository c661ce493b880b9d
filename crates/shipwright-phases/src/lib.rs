//! The three phases the orchestrator sequences, plus their collaborator
//! seams.
//!
//! - [`RequirementsCollector`] runs a [`Dialog`] under an [`Interviewer`]
//!   until it yields a [`SpecDocument`](shipwright_model::SpecDocument).
//! - [`CodeGenerator`] asks a [`Synthesizer`] for files and enforces the
//!   project floor.
//! - [`Packager`] archives an accepted project.
//!
//! Enable the `test-utils` feature for scripted collaborators.

mod collector;
mod command_synth;
mod dialog;
mod generator;
mod interview;
mod packager;
mod synth;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use collector::{CollectError, RequirementsCollector};
pub use command_synth::CommandSynthesizer;
pub use dialog::{Dialog, DialogError, DialogTurn, FALLBACK_ANSWER, StdioDialog};
pub use generator::{CodeGenerator, GenerationError};
pub use interview::{ChecklistInterviewer, Interviewer, Step};
pub use packager::{PackageError, Packager, ZipPackager};
pub use synth::{SynthesisError, SynthesisRequest, Synthesizer};
