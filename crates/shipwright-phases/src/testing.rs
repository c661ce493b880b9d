//! Scripted collaborators for tests.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use camino::Utf8Path;
use shipwright_model::{FailureRecord, GeneratedProject};
use shipwright_utils::CancellationToken;

use crate::dialog::{Dialog, DialogError};
use crate::packager::{PackageError, Packager};
use crate::synth::{SynthesisError, SynthesisRequest, Synthesizer};

/// Answers questions from a fixed list, then reports the dialog closed.
#[derive(Debug, Default)]
pub struct ScriptedDialog {
    answers: Mutex<VecDeque<String>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedDialog {
    #[must_use]
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|a| (*a).to_string()).collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Questions asked so far, in order.
    #[must_use]
    pub fn questions(&self) -> Vec<String> {
        self.asked.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Dialog for ScriptedDialog {
    async fn ask(&self, question: &str) -> Result<String, DialogError> {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(question.to_string());
        }
        self.answers
            .lock()
            .map_err(|_| DialogError::Io("script poisoned".to_string()))?
            .pop_front()
            .ok_or(DialogError::Closed)
    }
}

/// What a [`ScriptedSynthesizer`] was asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub attempt: u32,
    pub spec_digest: String,
    pub prior_failures: Vec<FailureRecord>,
}

pub type SynthesisResponse = Result<BTreeMap<String, String>, SynthesisError>;

/// Replays canned responses in order; fails once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedSynthesizer {
    responses: Mutex<VecDeque<SynthesisResponse>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedSynthesizer {
    #[must_use]
    pub fn new(responses: Vec<SynthesisResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn files(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(p, c)| ((*p).to_string(), (*c).to_string()))
            .collect()
    }

    /// A tiny Python project with a source module and a test module.
    #[must_use]
    pub fn python_adder() -> BTreeMap<String, String> {
        Self::files(&[
            ("adder.py", "def add(a, b):\n    return a + b\n"),
            (
                "tests/test_adder.py",
                "from adder import add\n\n\ndef test_add():\n    assert add(2, 3) == 5\n",
            ),
            ("README.md", "# adder\n"),
        ])
    }

    #[must_use]
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Synthesizer for ScriptedSynthesizer {
    async fn synthesize(
        &self,
        request: &SynthesisRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<BTreeMap<String, String>, SynthesisError> {
        if cancel.is_cancelled() {
            return Err(SynthesisError::Cancelled);
        }
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(RecordedRequest {
                attempt: request.attempt,
                spec_digest: request.spec_digest.to_string(),
                prior_failures: request.prior_failures.to_vec(),
            });
        }
        self.responses
            .lock()
            .map_err(|_| SynthesisError::Failed("script poisoned".to_string()))?
            .pop_front()
            .unwrap_or_else(|| Err(SynthesisError::Failed("synthesis script exhausted".to_string())))
    }
}

/// Always fails, leaving nothing at the destination.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingPackager;

impl Packager for FailingPackager {
    fn package(&self, _project: &GeneratedProject, dest: &Utf8Path) -> Result<(), PackageError> {
        Err(PackageError::Write {
            path: dest.to_string(),
            reason: "disk full".to_string(),
        })
    }
}
