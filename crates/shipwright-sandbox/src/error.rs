use std::io;

use shipwright_model::FailureKind;
use thiserror::Error;

/// The working directory could not be prepared, so no test ran.
#[derive(Debug, Error)]
pub enum SandboxSetupError {
    #[error("could not create sandbox directory under {root}: {source}")]
    CreateDir {
        root: String,
        #[source]
        source: io::Error,
    },

    #[error("could not write `{path}` into the sandbox: {source}")]
    Materialize {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl SandboxSetupError {
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        FailureKind::Sandbox
    }
}
