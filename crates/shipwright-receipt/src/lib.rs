//! Durable records of a run: the append-only audit log and the artifacts
//! written into the run directory.

mod audit;
mod report;
mod spec_artifact;

pub use audit::{AuditEntry, AuditError, AuditLog, AuditRecord};
pub use report::{RunSnapshot, emit_report_jcs, render_validation_markdown, write_reports};
pub use spec_artifact::{render_spec_markdown, write_spec_artifact};
