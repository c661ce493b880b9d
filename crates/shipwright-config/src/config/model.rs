use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use shipwright_model::FileClassifier;
use shipwright_utils::paths::DEFAULT_STATE_DIR;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_TURN_LIMIT: u32 = 12;
pub const DEFAULT_SANDBOX_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_INSTALL_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_KILL_GRACE_MS: u64 = 2_000;
pub const DEFAULT_OUTPUT_CAP_BYTES: usize = 256 * 1024;
pub const DEFAULT_GENERATOR_TIMEOUT_SECS: u64 = 600;

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConfigSource {
    /// Value provided via CLI argument (highest precedence).
    Cli,
    /// Value loaded from `.shipwright/config.toml`.
    File,
    /// Built-in default value (lowest precedence).
    Default,
}

/// Resolved configuration.
///
/// ```toml
/// [run]
/// max_attempts = 3
/// turn_limit = 12
/// state_dir = ".shipwright/runs"
///
/// [sandbox]
/// timeout_secs = 300
/// test_command = ["python", "-m", "pytest", "-v", "--tb=short"]
/// output_format = "pytest"
/// lint_command = ["ruff", "check", "."]
///
/// [[sandbox.install]]
/// marker = "requirements.txt"
/// command = ["python", "-m", "pip", "install", "-r", "requirements.txt"]
///
/// [generator]
/// command = ["my-codegen", "--json"]
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub run: RunSettings,
    pub sandbox: SandboxSettings,
    pub generator: GeneratorSettings,
    pub interview: InterviewSettings,
    pub classify: ClassifySettings,
    /// Config file that was loaded, if any.
    pub config_path: Option<PathBuf>,
    /// Source attribution for each setting (for `shipwright config`).
    pub source_attribution: BTreeMap<String, ConfigSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSettings {
    /// Upper bound on generation+validation attempts (repair cycles + 1).
    pub max_attempts: u32,
    /// Dialog turns before collection gives up.
    pub turn_limit: u32,
    pub state_dir: Utf8PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            turn_limit: DEFAULT_TURN_LIMIT,
            state_dir: Utf8PathBuf::from(DEFAULT_STATE_DIR),
        }
    }
}

/// Test output dialect the sandbox parses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    /// `pytest -v` per-test lines plus the short summary.
    #[default]
    Pytest,
    /// Test Anything Protocol.
    Tap,
}

/// Dependency installation step, tried when `marker` exists in the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallRule {
    pub marker: String,
    pub command: Vec<String>,
}

impl InstallRule {
    fn new(marker: &str, command: &[&str]) -> Self {
        Self {
            marker: marker.to_string(),
            command: command.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Project install first, `requirements.txt` as the fallback.
    ///
    /// Installs are non-editable: the sandbox points `PIP_TARGET` at a
    /// directory inside the working directory, which pip refuses to combine
    /// with `-e`.
    #[must_use]
    pub fn python_defaults() -> Vec<Self> {
        let project = ["python", "-m", "pip", "install", "--quiet", "."];
        vec![
            Self::new("pyproject.toml", &project),
            Self::new("setup.py", &project),
            Self::new(
                "requirements.txt",
                &["python", "-m", "pip", "install", "--quiet", "-r", "requirements.txt"],
            ),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxSettings {
    /// Parent for per-attempt working directories; system temp dir when unset.
    pub root: Option<Utf8PathBuf>,
    pub timeout_secs: u64,
    pub install_timeout_secs: u64,
    pub kill_grace_ms: u64,
    pub output_cap_bytes: usize,
    pub test_command: Vec<String>,
    pub output_format: OutputFormat,
    /// Environment variables copied into the otherwise empty test environment.
    pub env_passthrough: Vec<String>,
    pub install: Vec<InstallRule>,
    /// Optional static-analysis command run before the tests. Its result is
    /// reported but never affects the verdict.
    pub lint_command: Option<Vec<String>>,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            root: None,
            timeout_secs: DEFAULT_SANDBOX_TIMEOUT_SECS,
            install_timeout_secs: DEFAULT_INSTALL_TIMEOUT_SECS,
            kill_grace_ms: DEFAULT_KILL_GRACE_MS,
            output_cap_bytes: DEFAULT_OUTPUT_CAP_BYTES,
            test_command: ["python", "-m", "pytest", "-v", "--tb=short"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            output_format: OutputFormat::Pytest,
            env_passthrough: ["PATH", "LANG", "LC_ALL", "SYSTEMROOT"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            install: InstallRule::python_defaults(),
            lint_command: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorSettings {
    /// argv of the generation command; empty means "not configured".
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: DEFAULT_GENERATOR_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewSettings {
    pub topics: Vec<String>,
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            topics: [
                "What is the main goal of the project, in one or two sentences?",
                "What inputs does it take (arguments, files, stdin, network)?",
                "What outputs should it produce, and in what format?",
                "Are there constraints on language version, libraries or performance?",
                "Which behaviours must the tests cover?",
                "How should it be delivered (CLI entry point, library, script)?",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifySettings {
    pub test_patterns: Vec<String>,
    pub metadata_patterns: Vec<String>,
}

impl Default for ClassifySettings {
    fn default() -> Self {
        let owned = |patterns: &[&str]| -> Vec<String> {
            patterns.iter().map(|s| (*s).to_string()).collect()
        };
        Self {
            test_patterns: owned(FileClassifier::DEFAULT_TEST_PATTERNS),
            metadata_patterns: owned(FileClassifier::DEFAULT_METADATA_PATTERNS),
        }
    }
}
