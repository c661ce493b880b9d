//! On-disk layout of a run.
//!
//! ```text
//! <state_dir>/
//!   shipwright.log          shared debug log, every line tagged with run_id
//!   <run_id>/
//!     audit.jsonl           append-only phase/dialog records
//!     SPEC.md               written once collection completes
//!     VALIDATION.md         written once at DONE or FAILED
//!     report.json           canonical JSON twin of VALIDATION.md
//!     deliverable.zip       only present for DONE runs
//! ```

use camino::{Utf8Path, Utf8PathBuf};

pub const DEFAULT_STATE_DIR: &str = ".shipwright/runs";
pub const LOG_FILE_NAME: &str = "shipwright.log";

/// Paths owned by a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: Utf8PathBuf,
}

impl RunLayout {
    #[must_use]
    pub fn new(state_dir: &Utf8Path, run_id: &str) -> Self {
        Self {
            root: state_dir.join(run_id),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    #[must_use]
    pub fn audit_log(&self) -> Utf8PathBuf {
        self.root.join("audit.jsonl")
    }

    #[must_use]
    pub fn spec_artifact(&self) -> Utf8PathBuf {
        self.root.join("SPEC.md")
    }

    #[must_use]
    pub fn report_artifact(&self) -> Utf8PathBuf {
        self.root.join("VALIDATION.md")
    }

    #[must_use]
    pub fn report_json(&self) -> Utf8PathBuf {
        self.root.join("report.json")
    }

    #[must_use]
    pub fn deliverable(&self) -> Utf8PathBuf {
        self.root.join("deliverable.zip")
    }

    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }
}

/// Location of the shared log file for a state directory.
#[must_use]
pub fn log_file(state_dir: &Utf8Path) -> Utf8PathBuf {
    state_dir.join(LOG_FILE_NAME)
}
