use std::sync::Arc;

use shipwright_model::{
    FailureKind, FailureRecord, FileClassifier, GeneratedProject, ProjectError, SpecDocument,
};
use shipwright_utils::CancellationToken;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::synth::{SynthesisError, SynthesisRequest, Synthesizer};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The caller broke the generator's contract. Never retried.
    #[error("generation precondition violated: {reason}")]
    Precondition { reason: String },

    #[error("generator returned no files")]
    Empty,

    #[error("generator output rejected: {reason}")]
    Malformed { reason: String },

    #[error("generator failed: {reason}")]
    Collaborator { reason: String },

    #[error("generation cancelled")]
    Cancelled,
}

impl GenerationError {
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Precondition { .. } => FailureKind::InvalidInput,
            Self::Empty | Self::Malformed { .. } | Self::Collaborator { .. } => {
                FailureKind::Generation
            }
            Self::Cancelled => FailureKind::Cancellation,
        }
    }

    /// Eligible for the one immediate retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), FailureKind::Generation)
    }
}

impl From<ProjectError> for GenerationError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::Empty => Self::Empty,
            other => Self::Malformed {
                reason: other.to_string(),
            },
        }
    }
}

/// Turns a spec into a validated [`GeneratedProject`].
pub struct CodeGenerator {
    synthesizer: Arc<dyn Synthesizer>,
    classifier: FileClassifier,
}

impl CodeGenerator {
    #[must_use]
    pub fn new(synthesizer: Arc<dyn Synthesizer>, classifier: FileClassifier) -> Self {
        Self {
            synthesizer,
            classifier,
        }
    }

    /// Generate attempt `attempt`.
    ///
    /// Attempt 1 requires a complete spec; later attempts are repairs and
    /// require at least one prior failure.
    pub async fn generate(
        &self,
        spec: &Arc<SpecDocument>,
        attempt: u32,
        prior_failures: &[FailureRecord],
        cancel: &CancellationToken,
    ) -> Result<GeneratedProject, GenerationError> {
        check_preconditions(spec, attempt, prior_failures)?;

        let request = SynthesisRequest::new(spec, attempt, prior_failures);
        debug!(attempt, repair = request.is_repair(), "requesting synthesis");

        let files = self
            .synthesizer
            .synthesize(&request, cancel)
            .await
            .map_err(|e| match e {
                SynthesisError::Cancelled => GenerationError::Cancelled,
                SynthesisError::Malformed(reason) => GenerationError::Malformed { reason },
                SynthesisError::Failed(reason) => GenerationError::Collaborator { reason },
            })?;

        let project = GeneratedProject::new(Arc::clone(spec), attempt, files, &self.classifier)
            .map_err(|e| {
                warn!(attempt, error = %e, "generated files rejected");
                GenerationError::from(e)
            })?;
        info!(attempt, files = project.len(), "project generated");
        Ok(project)
    }
}

fn check_preconditions(
    spec: &SpecDocument,
    attempt: u32,
    prior_failures: &[FailureRecord],
) -> Result<(), GenerationError> {
    if attempt == 0 {
        return Err(GenerationError::Precondition {
            reason: "attempt numbers start at 1".to_string(),
        });
    }
    if !spec.is_complete() {
        return Err(GenerationError::Precondition {
            reason: "requirements are incomplete".to_string(),
        });
    }
    if attempt > 1 && prior_failures.is_empty() {
        return Err(GenerationError::Precondition {
            reason: format!("repair attempt {attempt} has no failures to fix"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedSynthesizer;
    use shipwright_model::Requirement;

    fn spec(complete: bool) -> Arc<SpecDocument> {
        let statements = vec![Requirement::user("adder")];
        Arc::new(if complete {
            SpecDocument::complete(statements)
        } else {
            SpecDocument::incomplete(statements)
        })
    }

    fn generator(synth: &Arc<ScriptedSynthesizer>) -> CodeGenerator {
        CodeGenerator::new(synth.clone(), FileClassifier::default())
    }

    #[tokio::test]
    async fn incomplete_spec_never_reaches_synthesizer() {
        let synth = Arc::new(ScriptedSynthesizer::new(vec![]));
        let err = generator(&synth)
            .generate(&spec(false), 1, &[], &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GenerationError::Precondition { .. }));
        assert!(!err.is_retryable());
        assert_eq!(synth.calls(), 0);
    }

    #[tokio::test]
    async fn repair_requires_failures() {
        let synth = Arc::new(ScriptedSynthesizer::new(vec![]));
        let err = generator(&synth)
            .generate(&spec(true), 2, &[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Precondition { .. }));
    }

    #[tokio::test]
    async fn empty_output_is_retryable() {
        let synth = Arc::new(ScriptedSynthesizer::new(vec![Ok(Default::default())]));
        let err = generator(&synth)
            .generate(&spec(true), 1, &[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, GenerationError::Empty);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn missing_tests_is_malformed() {
        let synth = Arc::new(ScriptedSynthesizer::new(vec![Ok(ScriptedSynthesizer::files(
            &[("src/app.py", "print(1)\n")],
        ))]));
        let err = generator(&synth)
            .generate(&spec(true), 1, &[], &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Malformed { .. }));
    }

    #[tokio::test]
    async fn repair_passes_failures_through() {
        let synth = Arc::new(ScriptedSynthesizer::new(vec![Ok(
            ScriptedSynthesizer::python_adder(),
        )]));
        let failures = vec![FailureRecord::new("tests/test_adder.py::test_neg", "assert -1 == 1")];
        let project = generator(&synth)
            .generate(&spec(true), 2, &failures, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(project.attempt(), 2);
        let requests = synth.requests();
        assert_eq!(requests[0].attempt, 2);
        assert_eq!(requests[0].prior_failures, failures);
    }
}
