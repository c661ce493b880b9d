use std::path::{Path, PathBuf};
use std::time::Duration;

use shipwright_config::{InstallRule, OutputFormat, SandboxSettings};
use shipwright_model::{GeneratedProject, ValidationReport};
use shipwright_runner::{CommandSpec, ExecLimits, ProcessOutput, RunnerError, run_bounded};
use shipwright_utils::CancellationToken;
use shipwright_utils::text::tail_chars;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::install::InstallFailure;
use crate::parse::parse_output;
use crate::workdir::WorkDir;

/// Characters of combined output kept on a report.
const OUTPUT_TAIL_CHARS: usize = 4_000;

/// Validation was abandoned because the run was cancelled. The working
/// directory and every process started for it are gone by the time this is
/// returned.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("validation cancelled")]
pub struct ValidationCancelled;

/// Runtime settings for [`ValidationSandbox`].
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Parent for per-attempt directories; the system temp dir when `None`.
    pub root: Option<PathBuf>,
    pub test_command: Vec<String>,
    pub output_format: OutputFormat,
    pub install: Vec<InstallRule>,
    pub install_timeout: Duration,
    pub kill_grace: Duration,
    pub output_cap: usize,
    pub env_passthrough: Vec<String>,
    pub lint_command: Option<Vec<String>>,
}

impl SandboxConfig {
    #[must_use]
    pub fn from_settings(settings: &SandboxSettings) -> Self {
        Self {
            root: settings.root.as_ref().map(|r| r.as_std_path().to_path_buf()),
            test_command: settings.test_command.clone(),
            output_format: settings.output_format,
            install: settings.install.clone(),
            install_timeout: Duration::from_secs(settings.install_timeout_secs),
            kill_grace: Duration::from_millis(settings.kill_grace_ms),
            output_cap: settings.output_cap_bytes,
            env_passthrough: settings.env_passthrough.clone(),
            lint_command: settings.lint_command.clone(),
        }
    }

    /// A config that runs `test_command` with no install step.
    #[must_use]
    pub fn for_command<S: AsRef<str>>(test_command: &[S], output_format: OutputFormat) -> Self {
        Self {
            test_command: test_command.iter().map(|s| s.as_ref().to_string()).collect(),
            output_format,
            install: Vec::new(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    #[must_use]
    pub fn with_lint<S: AsRef<str>>(mut self, lint_command: &[S]) -> Self {
        self.lint_command = Some(lint_command.iter().map(|s| s.as_ref().to_string()).collect());
        self
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self::from_settings(&SandboxSettings::default())
    }
}

/// Executes a generated project's tests in an isolated directory.
#[derive(Debug, Clone)]
pub struct ValidationSandbox {
    pub(crate) config: SandboxConfig,
}

impl ValidationSandbox {
    #[must_use]
    pub const fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run the project's tests and report the verdict.
    ///
    /// Never fails: anything that stops the suite from running becomes a
    /// SANDBOX_ERROR report.
    pub async fn validate(&self, project: &GeneratedProject, timeout: Duration) -> ValidationReport {
        let never = CancellationToken::new();
        match self.validate_cancellable(project, timeout, &never).await {
            Ok(report) => report,
            Err(ValidationCancelled) => {
                ValidationReport::sandbox_error(project.attempt(), "validation cancelled")
            }
        }
    }

    /// [`validate`](Self::validate) that stops early when `cancel` fires.
    #[tracing::instrument(skip_all, fields(attempt = project.attempt()))]
    pub async fn validate_cancellable(
        &self,
        project: &GeneratedProject,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport, ValidationCancelled> {
        let attempt = project.attempt();
        if cancel.is_cancelled() {
            return Err(ValidationCancelled);
        }

        let work = match WorkDir::create(self.config.root.as_deref(), attempt) {
            Ok(work) => work,
            Err(e) => {
                warn!(error = %e, "sandbox setup failed");
                return Ok(ValidationReport::sandbox_error(attempt, e.to_string()));
            }
        };

        let result = self.run_in(&work, project, timeout, cancel).await;
        work.release();

        if let Ok(report) = &result {
            info!(
                verdict = %report.verdict(),
                passed = ?report.passed(),
                failed = ?report.failed(),
                "validation finished"
            );
        }
        result
    }

    async fn run_in(
        &self,
        work: &WorkDir,
        project: &GeneratedProject,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport, ValidationCancelled> {
        let attempt = project.attempt();

        if let Err(e) = work.materialize(project) {
            warn!(error = %e, "sandbox setup failed");
            return Ok(ValidationReport::sandbox_error(attempt, e.to_string()));
        }

        match self.install(work, cancel).await {
            Ok(()) => {}
            Err(InstallFailure::Cancelled) => return Err(ValidationCancelled),
            Err(InstallFailure::Failed(reason)) => {
                return Ok(ValidationReport::sandbox_error(attempt, reason));
            }
        }

        let lint = self.lint(work, timeout, cancel).await?;
        let report = self.run_tests(work, attempt, timeout, cancel).await?;
        Ok(report.with_lint(lint))
    }

    async fn run_tests(
        &self,
        work: &WorkDir,
        attempt: u32,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<ValidationReport, ValidationCancelled> {
        let spec = match self.command(&self.config.test_command, work) {
            Ok(spec) => spec,
            Err(reason) => return Ok(ValidationReport::sandbox_error(attempt, reason)),
        };
        let limits = ExecLimits::new(timeout)
            .with_kill_grace(self.config.kill_grace)
            .with_output_cap(self.config.output_cap);

        debug!(command = %spec.display(), ?timeout, "running test suite");
        let output = match run_bounded(&spec, None, &limits, cancel).await {
            Ok(output) => output,
            Err(RunnerError::Cancelled) => return Err(ValidationCancelled),
            Err(RunnerError::Timeout { timeout }) => {
                return Ok(ValidationReport::sandbox_error(
                    attempt,
                    format!(
                        "test suite timed out after {:.1}s; process group killed",
                        timeout.as_secs_f64()
                    ),
                ));
            }
            Err(e) => return Ok(ValidationReport::sandbox_error(attempt, e.to_string())),
        };

        let combined = output.combined();
        let parsed = parse_output(self.config.output_format, &combined);
        let duration_ms = u64::try_from(output.duration.as_millis()).unwrap_or(u64::MAX);
        let tail = tail_chars(&combined, OUTPUT_TAIL_CHARS);

        let signal = fatal_signal(&output).filter(|_| parsed.counts.failed == 0);
        let report = if let Some(signal) = signal {
            warn!(signal, reported = parsed.counts.total(), "test runner killed by signal");
            ValidationReport::sandbox_error(
                attempt,
                format!(
                    "test runner killed by signal {signal} after {} test(s) reported",
                    parsed.counts.total()
                ),
            )
        } else if parsed.counts.total() == 0 && !output.success() {
            let code = output
                .exit_code
                .map_or_else(|| "unknown".to_string(), |c| c.to_string());
            ValidationReport::sandbox_error(
                attempt,
                format!("test runner exited with code {code} before any test ran"),
            )
        } else {
            if parsed.counts.failed == 0 && parsed.counts.total() > 0 && !output.success() {
                warn!(
                    exit_code = ?output.exit_code,
                    passed = parsed.counts.passed,
                    "test runner exited non-zero but reported no failures"
                );
            }
            ValidationReport::from_counts(attempt, parsed.counts, parsed.failures)
        };

        Ok(report.with_execution(output.exit_code, duration_ms, tail))
    }

    /// Build a scrubbed command running in `work`.
    pub(crate) fn command(&self, argv: &[String], work: &WorkDir) -> Result<CommandSpec, String> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| "no command configured".to_string())?;
        let program = resolve_program(program, work.path())?;

        let mut spec = CommandSpec::new(program)
            .args(args)
            .cwd(work.path())
            .clear_env();
        for key in &self.config.env_passthrough {
            if let Some(value) = std::env::var_os(key) {
                spec = spec.env(key, value);
            }
        }
        let home = work.home();
        let tmp = work.tmp();
        let deps = work.deps();
        Ok(spec
            .env("HOME", &home)
            .env("TMPDIR", &tmp)
            .env("TMP", &tmp)
            .env("TEMP", &tmp)
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .env("PIP_DISABLE_PIP_VERSION_CHECK", "1")
            // pip writes into the working directory, never the host interpreter.
            .env("PIP_TARGET", &deps)
            .env("PYTHONPATH", &deps)
            .env("PYTHONUSERBASE", home.join(".local"))
            .env("PIP_CACHE_DIR", home.join(".cache").join("pip")))
    }
}

/// Signal that ended the runner, directly or as a shell's `128 + N` status.
/// Tallies from such a run are incomplete.
fn fatal_signal(output: &ProcessOutput) -> Option<i32> {
    output.signal.or_else(|| {
        output
            .exit_code
            .filter(|code| (129..=192).contains(code))
            .map(|code| code - 128)
    })
}

/// Bare names are looked up on the host `PATH`; relative paths are taken
/// relative to the working directory.
fn resolve_program(program: &str, work: &Path) -> Result<PathBuf, String> {
    let candidate = Path::new(program);
    if candidate.is_absolute() {
        return Ok(candidate.to_path_buf());
    }
    if candidate.components().count() > 1 {
        return Ok(work.join(candidate));
    }
    which::which_in(program, std::env::var_os("PATH"), work)
        .map_err(|_| format!("program `{program}` not found on PATH"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_convert() {
        let config = SandboxConfig::from_settings(&SandboxSettings::default());
        assert_eq!(config.install.len(), 3);
        assert_eq!(config.kill_grace, Duration::from_secs(2));
        assert_eq!(config.output_format, OutputFormat::Pytest);
    }

    #[test]
    fn for_command_skips_install() {
        let config = SandboxConfig::for_command(&["sh", "run.sh"], OutputFormat::Tap);
        assert!(config.install.is_empty());
        assert_eq!(config.test_command, vec!["sh", "run.sh"]);
    }

    #[test]
    fn relative_program_is_anchored_in_workdir() {
        let work = Path::new("/tmp/w");
        assert_eq!(
            resolve_program("./run.sh", work).unwrap(),
            PathBuf::from("/tmp/w/./run.sh")
        );
        assert_eq!(
            resolve_program("/bin/sh", work).unwrap(),
            PathBuf::from("/bin/sh")
        );
    }

    #[test]
    fn missing_program_is_reported() {
        let err = resolve_program("definitely-not-a-real-binary-xyz", Path::new("/")).unwrap_err();
        assert!(err.contains("not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rejected_suite_reports_failures_and_cleans_up() {
        use shipwright_model::{FileClassifier, Requirement, SpecDocument, Verdict};
        use std::sync::Arc;

        let root = tempfile::TempDir::new().unwrap();
        let spec = Arc::new(SpecDocument::complete(vec![Requirement::user("demo")]));
        let project = GeneratedProject::new(
            spec,
            2,
            [
                ("demo.py", "x = 1\n"),
                ("tests/run.sh", "echo 'ok 1 - a'\necho 'not ok 2 - b'\necho '# boom'\nexit 1\n"),
            ],
            &FileClassifier::default(),
        )
        .unwrap();
        let sandbox = ValidationSandbox::new(
            SandboxConfig::for_command(&["sh", "tests/run.sh"], OutputFormat::Tap)
                .with_root(root.path()),
        );

        let report = sandbox.validate(&project, Duration::from_secs(20)).await;

        assert_eq!(report.verdict(), Verdict::Rejected);
        assert_eq!(report.attempt(), 2);
        assert_eq!(report.failures()[0].test_id, "b");
        assert_eq!(report.failures()[0].message, "boom");
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
