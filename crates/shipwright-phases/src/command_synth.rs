//! Synthesizer backed by an external command.
//!
//! The request packet is written to the command's stdin as one JSON object.
//! The command answers on stdout with `{"files": {"path": "content", ...}}`.
//! Streaming tools may print progress lines first; the last line that parses
//! as such an object wins, and a single pretty-printed object is accepted too.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use shipwright_runner::{CommandSpec, ExecLimits, RunnerError, run_bounded};
use shipwright_utils::CancellationToken;
use shipwright_utils::text::tail_chars;
use tracing::{debug, warn};

use crate::synth::{SynthesisError, SynthesisRequest, Synthesizer};

const STDERR_TAIL_CHARS: usize = 1_000;

#[derive(Debug, Deserialize)]
struct FilesPayload {
    files: BTreeMap<String, String>,
}

pub struct CommandSynthesizer {
    argv: Vec<String>,
    limits: ExecLimits,
}

impl CommandSynthesizer {
    #[must_use]
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self {
            argv,
            limits: ExecLimits::new(timeout),
        }
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: ExecLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[async_trait]
impl Synthesizer for CommandSynthesizer {
    async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, String>, SynthesisError> {
        let spec = CommandSpec::from_argv(&self.argv)
            .ok_or_else(|| SynthesisError::Failed("no generator command configured".to_string()))?;
        let packet = serde_json::to_vec(request)
            .map_err(|e| SynthesisError::Failed(format!("could not encode request: {e}")))?;

        debug!(command = %spec.display(), attempt = request.attempt, "invoking generator");
        let output = match run_bounded(&spec, Some(&packet), &self.limits, cancel).await {
            Ok(output) => output,
            Err(RunnerError::Cancelled) => return Err(SynthesisError::Cancelled),
            Err(e) => return Err(SynthesisError::Failed(e.to_string())),
        };

        if !output.success() {
            warn!(exit_code = ?output.exit_code, "generator exited unsuccessfully");
            return Err(SynthesisError::Failed(format!(
                "generator exited with code {}: {}",
                output
                    .exit_code
                    .map_or_else(|| "unknown".to_string(), |c| c.to_string()),
                tail_chars(output.stderr.trim(), STDERR_TAIL_CHARS)
            )));
        }

        parse_files(&output.stdout)
    }
}

fn parse_files(stdout: &str) -> Result<BTreeMap<String, String>, SynthesisError> {
    if let Ok(payload) = serde_json::from_str::<FilesPayload>(stdout.trim()) {
        return Ok(payload.files);
    }
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| serde_json::from_str::<FilesPayload>(line).ok())
        .map(|payload| payload.files)
        .ok_or_else(|| {
            SynthesisError::Malformed("stdout contained no JSON object with a `files` map".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_json_line_wins() {
        let stdout = r#"{"progress": 10}
{"files": {"a.py": "old"}}
thinking...
{"files": {"a.py": "new", "tests/test_a.py": "t"}}
"#;
        let files = parse_files(stdout).unwrap();
        assert_eq!(files["a.py"], "new");
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn pretty_printed_object_is_accepted() {
        let stdout = "{\n  \"files\": {\n    \"a.py\": \"x\"\n  }\n}\n";
        assert_eq!(parse_files(stdout).unwrap().len(), 1);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_files("Sorry, I can't do that."),
            Err(SynthesisError::Malformed(_))
        ));
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use shipwright_model::{Requirement, SpecDocument};

        fn sh(script: &str) -> CommandSynthesizer {
            CommandSynthesizer::new(
                vec!["sh".into(), "-c".into(), script.into()],
                Duration::from_secs(10),
            )
        }

        #[tokio::test]
        async fn request_packet_reaches_stdin() {
            // Echo the packet's attempt back as a file so the round trip is visible.
            let synth = sh(
                r#"packet=$(cat); case "$packet" in *'"attempt":1'*) a=one;; *) a=other;; esac; printf '{"files":{"attempt.txt":"%s"}}\n' "$a""#,
            );
            let spec = SpecDocument::complete(vec![Requirement::user("x")]);
            let request = SynthesisRequest::new(&spec, 1, &[]);

            let files = synth
                .synthesize(&request, &CancellationToken::new())
                .await
                .unwrap();
            assert_eq!(files["attempt.txt"], "one");
        }

        #[tokio::test]
        async fn nonzero_exit_is_a_collaborator_failure() {
            let synth = sh("echo boom >&2; exit 3");
            let spec = SpecDocument::complete(vec![Requirement::user("x")]);
            let err = synth
                .synthesize(&SynthesisRequest::new(&spec, 1, &[]), &CancellationToken::new())
                .await
                .unwrap_err();
            let SynthesisError::Failed(reason) = err else {
                panic!("expected Failed");
            };
            assert!(reason.contains("code 3"));
            assert!(reason.contains("boom"));
        }
    }
}
