//! Top-level error type for the CLI and embedders.

use shipwright_config::ConfigError;
use shipwright_model::ProjectError;
use shipwright_orchestrator::OrchestratorError;
use shipwright_receipt::AuditError;
use shipwright_utils::ExitCode;
use thiserror::Error;

/// Anything that stops shipwright before a run can report its own outcome.
///
/// A run that reaches FAILED is not an error: it produces a [`RunOutcome`]
/// whose exit code comes from its failure reason. `ShipwrightError` covers
/// what happens around a run: bad configuration, an unreadable project
/// directory, or the orchestrator losing its records.
///
/// | Exit Code | Error Type |
/// |-----------|------------|
/// | 2 | Configuration or CLI argument errors |
/// | 3 | Project directory unusable for `validate` |
/// | 1 | Everything else |
///
/// [`RunOutcome`]: shipwright_orchestrator::RunOutcome
#[derive(Error, Debug)]
pub enum ShipwrightError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Discovery or parsing failed before a [`ConfigError`] could be formed.
    #[error("Configuration error: {0:#}")]
    ConfigLoad(anyhow::Error),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("Project error in {dir}: {source}")]
    Project {
        dir: String,
        #[source]
        source: ProjectError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to start async runtime: {0}")]
    Runtime(String),
}

impl ShipwrightError {
    /// Map this error to the CLI exit code.
    #[must_use]
    pub const fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) | Self::ConfigLoad(_) => ExitCode::CLI_ARGS,
            Self::Project { .. } => ExitCode::INVALID_INPUT,
            Self::Orchestrator(_) | Self::Io(_) | Self::Runtime(_) => ExitCode::INTERNAL,
        }
    }

    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(ConfigError::MissingRequired { key, .. }) => {
                format!("Required setting `{key}` is not configured")
            }
            Self::Config(err) => err.to_string(),
            Self::ConfigLoad(err) => format!("Could not load configuration: {err:#}"),
            Self::Orchestrator(OrchestratorError::Audit(err)) => {
                format!("The audit log could not be written: {err}")
            }
            Self::Orchestrator(err) => format!("The run could not be completed: {err}"),
            Self::Project { dir, source } => format!("`{dir}` is not a testable project: {source}"),
            Self::Io(err) => format!("File system operation failed: {err}"),
            Self::Runtime(reason) => format!("Could not start the async runtime: {reason}"),
        }
    }

    #[must_use]
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(ConfigError::MissingRequired { hint, .. }) => vec![hint.clone()],
            Self::Config(_) | Self::ConfigLoad(_) => vec![
                "Run `shipwright config` to see the effective configuration".to_string(),
                "Check .shipwright/config.toml for typos; unknown keys are rejected".to_string(),
            ],
            Self::Orchestrator(OrchestratorError::Audit(_) | OrchestratorError::Setup { .. }) => {
                vec![
                    "Check that the state directory is writable and the disk is not full"
                        .to_string(),
                    "Use --state-dir to point runs somewhere else".to_string(),
                ]
            }
            Self::Orchestrator(_) => vec![
                "Re-run with --verbose and inspect <state_dir>/shipwright.log".to_string(),
            ],
            Self::Project { .. } => vec![
                "The directory must contain at least one test file (tests/**, test_*) and one source file"
                    .to_string(),
            ],
            Self::Io(_) | Self::Runtime(_) => Vec::new(),
        }
    }

    /// Message plus suggestions, ready for stderr.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = format!("Error: {}\n", self.user_message());
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {suggestion}\n"));
            }
        }
        output
    }
}

impl From<AuditError> for ShipwrightError {
    fn from(err: AuditError) -> Self {
        Self::Orchestrator(OrchestratorError::Audit(err))
    }
}
