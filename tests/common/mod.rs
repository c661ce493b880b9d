//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use shipwright::{
    OutputFormat, Orchestrator, OrchestratorSettings, Packager, SandboxConfig, ValidationSandbox,
    ZipPackager,
};
use shipwright_model::FileClassifier;
use shipwright_phases::testing::{ScriptedDialog, ScriptedSynthesizer};
use shipwright_phases::{ChecklistInterviewer, CodeGenerator, RequirementsCollector};
use tempfile::TempDir;

pub const TOPICS: &[&str] = &[
    "What should the program do?",
    "How should it be tested?",
];

/// Test command used by every TAP-driven scenario: the generated project
/// ships its own `tests/run.sh`.
pub const TAP_COMMAND: &[&str] = &["sh", "tests/run.sh"];

pub struct Harness {
    pub state: TempDir,
    pub sandbox_root: TempDir,
    pub dialog: Arc<ScriptedDialog>,
    pub synth: Arc<ScriptedSynthesizer>,
}

impl Harness {
    pub fn new(answers: &[&str], synth: ScriptedSynthesizer) -> Self {
        Self {
            state: TempDir::new().unwrap(),
            sandbox_root: TempDir::new().unwrap(),
            dialog: Arc::new(ScriptedDialog::new(answers)),
            synth: Arc::new(synth),
        }
    }

    pub fn state_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.state.path().join("runs")).unwrap()
    }

    pub fn sandbox(&self, command: &[&str], format: OutputFormat) -> SandboxConfig {
        SandboxConfig::for_command(command, format).with_root(self.sandbox_root.path())
    }

    pub fn orchestrator(&self, max_attempts: u32, timeout: Duration) -> Orchestrator {
        self.orchestrator_with(
            self.sandbox(TAP_COMMAND, OutputFormat::Tap),
            Arc::new(ZipPackager),
            max_attempts,
            timeout,
        )
    }

    pub fn orchestrator_with(
        &self,
        sandbox: SandboxConfig,
        packager: Arc<dyn Packager>,
        max_attempts: u32,
        timeout: Duration,
    ) -> Orchestrator {
        let topics = TOPICS.iter().map(|t| (*t).to_string()).collect();
        Orchestrator::new(
            RequirementsCollector::new(
                self.dialog.clone(),
                Arc::new(ChecklistInterviewer::new(topics)),
                6,
            ),
            CodeGenerator::new(self.synth.clone(), FileClassifier::default()),
            ValidationSandbox::new(sandbox),
            packager,
            OrchestratorSettings {
                max_attempts,
                sandbox_timeout: timeout,
                state_dir: self.state_dir(),
            },
        )
    }

    /// Sandbox working directories still on disk.
    pub fn leftover_workdirs(&self) -> usize {
        entries(self.sandbox_root.path())
    }
}

pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

/// An adder project whose test runner prints `tap`.
pub fn tap_project(tap: &str) -> BTreeMap<String, String> {
    let script = format!("cat <<'TAP'\n{tap}\nTAP\n");
    ScriptedSynthesizer::files(&[
        ("adder.py", "def add(a, b):\n    return a + b\n"),
        ("tests/run.sh", script.as_str()),
        ("README.md", "# adder\n"),
    ])
}

pub fn four_passing() -> BTreeMap<String, String> {
    tap_project("1..4\nok 1 - adds\nok 2 - negatives\nok 3 - zero\nok 4 - prints sum")
}

pub fn three_of_four() -> BTreeMap<String, String> {
    tap_project(
        "1..4\nok 1 - adds\nnot ok 2 - negatives\n# expected -1, got 1\nok 3 - zero\nok 4 - prints sum",
    )
}
