//! Optional static analysis ahead of the test run.

use std::time::Duration;

use shipwright_model::LintSummary;
use shipwright_runner::{ExecLimits, RunnerError, run_bounded};
use shipwright_utils::CancellationToken;
use shipwright_utils::text::tail_chars;
use tracing::{debug, info, warn};

use crate::sandbox::{ValidationCancelled, ValidationSandbox};
use crate::workdir::WorkDir;

const LINT_TAIL_CHARS: usize = 2_000;

impl ValidationSandbox {
    /// Run the configured lint command, if any, under the test timeout.
    ///
    /// Every outcome other than cancellation becomes a [`LintSummary`]; a
    /// lint step that cannot start is recorded, not escalated.
    pub(crate) async fn lint(
        &self,
        work: &WorkDir,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<LintSummary>, ValidationCancelled> {
        let Some(argv) = &self.config.lint_command else {
            return Ok(None);
        };
        let spec = match self.command(argv, work) {
            Ok(spec) => spec,
            Err(reason) => {
                warn!(%reason, "lint command unavailable");
                return Ok(Some(LintSummary::new(
                    false,
                    None,
                    format!("lint did not run: {reason}"),
                    "",
                )));
            }
        };
        let limits = ExecLimits::new(timeout)
            .with_kill_grace(self.config.kill_grace)
            .with_output_cap(self.config.output_cap);

        debug!(command = %spec.display(), "running lint");
        let summary = match run_bounded(&spec, None, &limits, cancel).await {
            Ok(output) => {
                let tail = tail_chars(output.combined().trim_end(), LINT_TAIL_CHARS);
                if output.success() {
                    LintSummary::new(
                        true,
                        output.exit_code,
                        format!("`{}` found no issues", spec.display()),
                        tail,
                    )
                } else {
                    let code = output
                        .exit_code
                        .map_or_else(|| "unknown".to_string(), |c| c.to_string());
                    LintSummary::new(
                        false,
                        output.exit_code,
                        format!("`{}` reported issues (exit code {code})", spec.display()),
                        tail,
                    )
                }
            }
            Err(RunnerError::Cancelled) => return Err(ValidationCancelled),
            Err(RunnerError::Timeout { timeout }) => LintSummary::new(
                false,
                None,
                format!("lint timed out after {:.1}s", timeout.as_secs_f64()),
                "",
            ),
            Err(e) => LintSummary::new(false, None, format!("lint did not run: {e}"), ""),
        };
        info!(clean = summary.clean, "lint finished");
        Ok(Some(summary))
    }
}
