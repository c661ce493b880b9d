use std::ops::ControlFlow;
use std::sync::Arc;

use shipwright_model::{FailureKind, Requirement, SpecDocument};
use shipwright_utils::CancellationToken;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dialog::{Dialog, DialogError, DialogTurn, FALLBACK_ANSWER};
use crate::interview::{Interviewer, Step};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectError {
    #[error("invalid request: {reason}")]
    InvalidInput { reason: String },

    #[error("requirements collection cancelled")]
    Cancelled,

    /// The turn observer asked to stop (it failed to record a turn).
    #[error("requirements collection interrupted after turn {turn}")]
    Interrupted { turn: u32 },
}

impl CollectError {
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidInput { .. } => FailureKind::InvalidInput,
            Self::Cancelled | Self::Interrupted { .. } => FailureKind::Cancellation,
        }
    }
}

/// Runs the dialog until the interviewer concludes or the turn limit is hit.
pub struct RequirementsCollector {
    dialog: Arc<dyn Dialog>,
    interviewer: Arc<dyn Interviewer>,
    turn_limit: u32,
}

impl RequirementsCollector {
    #[must_use]
    pub fn new(dialog: Arc<dyn Dialog>, interviewer: Arc<dyn Interviewer>, turn_limit: u32) -> Self {
        Self {
            dialog,
            interviewer,
            turn_limit,
        }
    }

    /// [`collect_with`](Self::collect_with) without a turn observer or
    /// cancellation.
    pub async fn collect(&self, initial_request: &str) -> Result<SpecDocument, CollectError> {
        self.collect_with(initial_request, &CancellationToken::new(), |_| {
            ControlFlow::Continue(())
        })
        .await
    }

    /// Gather requirements for `initial_request`.
    ///
    /// `on_turn` sees every completed turn before the next question is
    /// asked; returning `Break` stops the dialog. Exceeding the turn limit,
    /// or the requester closing the dialog, yields a best-effort document
    /// with `is_complete() == false` rather than an error.
    pub async fn collect_with<F>(
        &self,
        initial_request: &str,
        cancel: &CancellationToken,
        mut on_turn: F,
    ) -> Result<SpecDocument, CollectError>
    where
        F: FnMut(&DialogTurn) -> ControlFlow<()> + Send,
    {
        let request = initial_request.trim();
        if request.is_empty() {
            return Err(CollectError::InvalidInput {
                reason: "the project request is empty".to_string(),
            });
        }

        let mut transcript: Vec<DialogTurn> = Vec::new();
        loop {
            if cancel.is_cancelled() {
                return Err(CollectError::Cancelled);
            }

            let question = match self.interviewer.next_step(request, &transcript) {
                Step::Conclude(statements) => {
                    info!(turns = transcript.len(), "requirements complete");
                    return Ok(SpecDocument::complete(seeded(request, statements)));
                }
                Step::Ask(question) => question,
            };

            let turn = u32::try_from(transcript.len()).unwrap_or(u32::MAX) + 1;
            if turn > self.turn_limit {
                warn!(turn_limit = self.turn_limit, "turn limit exceeded");
                return Ok(self.best_effort(request, &transcript));
            }

            let reply = tokio::select! {
                reply = self.dialog.ask(&question) => reply,
                () = cancel.cancelled() => return Err(CollectError::Cancelled),
            };
            let answer = match reply {
                Ok(answer) => answer,
                Err(DialogError::Closed) => {
                    warn!(turn, "requester closed the dialog");
                    return Ok(self.best_effort(request, &transcript));
                }
                Err(e) => {
                    warn!(turn, error = %e, "dialog failed");
                    return Ok(self.best_effort(request, &transcript));
                }
            };

            let record = match answer.trim() {
                "" => DialogTurn {
                    turn,
                    question,
                    answer: FALLBACK_ANSWER.to_string(),
                    fallback: true,
                },
                trimmed => DialogTurn {
                    turn,
                    question,
                    answer: trimmed.to_string(),
                    fallback: false,
                },
            };
            debug!(turn, fallback = record.fallback, "dialog turn");

            if on_turn(&record).is_break() {
                return Err(CollectError::Interrupted { turn });
            }
            transcript.push(record);
        }
    }

    fn best_effort(&self, request: &str, transcript: &[DialogTurn]) -> SpecDocument {
        SpecDocument::incomplete(seeded(request, self.interviewer.best_effort(transcript)))
    }
}

fn seeded(request: &str, statements: Vec<Requirement>) -> Vec<Requirement> {
    let mut all = Vec::with_capacity(statements.len() + 1);
    all.push(Requirement::user(request));
    all.extend(statements);
    all
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::ChecklistInterviewer;
    use crate::testing::ScriptedDialog;

    fn collector(answers: &[&str], limit: u32) -> (RequirementsCollector, Arc<ScriptedDialog>) {
        let dialog = Arc::new(ScriptedDialog::new(answers));
        let interviewer = Arc::new(ChecklistInterviewer::new(vec![
            "goal?".into(),
            "inputs?".into(),
            "outputs?".into(),
        ]));
        (
            RequirementsCollector::new(dialog.clone(), interviewer, limit),
            dialog,
        )
    }

    #[tokio::test]
    async fn empty_request_is_invalid() {
        let (c, dialog) = collector(&[], 5);
        let err = c.collect("   \n").await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidInput);
        assert!(dialog.questions().is_empty());
    }

    #[tokio::test]
    async fn concludes_with_request_first() {
        let (c, _) = collector(&["sum two numbers", "keep it simple"], 5);
        let spec = c.collect("add two numbers and print the sum").await.unwrap();

        assert!(spec.is_complete());
        assert_eq!(spec.initial_request(), Some("add two numbers and print the sum"));
        assert_eq!(spec.statements().len(), 2);
    }

    #[tokio::test]
    async fn turn_limit_yields_incomplete_document() {
        let (c, dialog) = collector(&["a", "b", "c"], 2);
        let spec = c.collect("build a thing").await.unwrap();

        assert!(!spec.is_complete());
        assert_eq!(dialog.questions().len(), 2);
        assert_eq!(spec.statements().len(), 3);
    }

    #[tokio::test]
    async fn empty_answer_is_replaced() {
        let (c, _) = collector(&["", "json", "stdout"], 5);
        let mut seen = Vec::new();
        let spec = c
            .collect_with("tool", &CancellationToken::new(), |t| {
                seen.push(t.clone());
                ControlFlow::Continue(())
            })
            .await
            .unwrap();

        assert!(spec.is_complete());
        assert!(seen[0].fallback);
        assert_eq!(seen[0].answer, FALLBACK_ANSWER);
        assert_eq!(seen.iter().map(|t| t.turn).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn closed_dialog_is_incomplete() {
        let (c, _) = collector(&["only one answer"], 5);
        let spec = c.collect("tool").await.unwrap();
        assert!(!spec.is_complete());
    }

    #[tokio::test]
    async fn observer_can_interrupt() {
        let (c, _) = collector(&["a", "b", "c"], 5);
        let err = c
            .collect_with("tool", &CancellationToken::new(), |_| ControlFlow::Break(()))
            .await
            .unwrap_err();
        assert_eq!(err, CollectError::Interrupted { turn: 1 });
    }

    #[tokio::test]
    async fn cancelled_before_first_question() {
        let (c, dialog) = collector(&["a"], 5);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = c
            .collect_with("tool", &cancel, |_| ControlFlow::Continue(()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Cancellation);
        assert!(dialog.questions().is_empty());
    }
}
