//! Dependency installation ahead of the test run.

use shipwright_config::InstallRule;
use shipwright_runner::{ExecLimits, RunnerError, run_bounded};
use shipwright_utils::CancellationToken;
use shipwright_utils::text::tail_chars;
use tracing::{debug, info, warn};

use crate::sandbox::ValidationSandbox;
use crate::workdir::WorkDir;

const INSTALL_ERROR_TAIL: usize = 800;

#[derive(Debug)]
pub(crate) enum InstallFailure {
    Failed(String),
    Cancelled,
}

/// Rules whose marker file exists at the project root, in configured order.
pub(crate) fn applicable<'a>(rules: &'a [InstallRule], work: &WorkDir) -> Vec<&'a InstallRule> {
    rules
        .iter()
        .filter(|rule| work.path().join(&rule.marker).is_file())
        .collect()
}

impl ValidationSandbox {
    /// Try each applicable rule until one succeeds. No applicable rule means
    /// nothing to install; every applicable rule failing is a sandbox error.
    pub(crate) async fn install(
        &self,
        work: &WorkDir,
        cancel: &CancellationToken,
    ) -> Result<(), InstallFailure> {
        let rules = applicable(&self.config.install, work);
        if rules.is_empty() {
            debug!("no dependency manifest found, skipping install");
            return Ok(());
        }

        let limits = ExecLimits::new(self.config.install_timeout)
            .with_kill_grace(self.config.kill_grace)
            .with_output_cap(self.config.output_cap);
        let mut last_error = String::new();

        for rule in rules {
            let spec = match self.command(&rule.command, work) {
                Ok(spec) => spec,
                Err(reason) => {
                    warn!(marker = %rule.marker, %reason, "install command unavailable");
                    last_error = reason;
                    continue;
                }
            };
            debug!(marker = %rule.marker, command = %spec.display(), "installing dependencies");

            match run_bounded(&spec, None, &limits, cancel).await {
                Ok(output) if output.success() => {
                    info!(marker = %rule.marker, "dependencies installed");
                    return Ok(());
                }
                Ok(output) => {
                    warn!(marker = %rule.marker, exit_code = ?output.exit_code, "install command failed");
                    last_error = format!(
                        "`{}` exited with {:?}: {}",
                        spec.display(),
                        output.exit_code,
                        tail_chars(output.stderr.trim(), INSTALL_ERROR_TAIL)
                    );
                }
                Err(RunnerError::Cancelled) => return Err(InstallFailure::Cancelled),
                Err(e) => {
                    warn!(marker = %rule.marker, error = %e, "install command failed");
                    last_error = e.to_string();
                }
            }
        }

        Err(InstallFailure::Failed(format!(
            "dependency installation failed: {last_error}"
        )))
    }
}
