//! Data contracts that flow forward through a run:
//! [`SpecDocument`] → [`GeneratedProject`] → [`ValidationReport`].
//!
//! All three are immutable once built. A repair produces a new project, a
//! revision produces a new spec; nothing is patched in place.

pub mod error;
pub mod project;
pub mod report;
pub mod spec;

pub use error::{FailureKind, ProjectError};
pub use project::{FileClassifier, FileRole, GeneratedProject, ProjectPath};
pub use report::{FailureRecord, LintSummary, TestCounts, ValidationReport, Verdict};
pub use spec::{Requirement, SpecDocument, StatementSource};
