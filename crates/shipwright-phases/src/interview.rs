//! Question strategy.

use shipwright_model::Requirement;

use crate::dialog::DialogTurn;

/// What the interviewer wants to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Ask(String),
    /// Requirements are complete; these statements follow the initial request.
    Conclude(Vec<Requirement>),
}

/// Decides, from the transcript so far, whether to ask another question.
///
/// Pure: the collector owns the dialog and the turn limit.
pub trait Interviewer: Send + Sync {
    fn next_step(&self, initial_request: &str, transcript: &[DialogTurn]) -> Step;

    /// Statements salvaged when the dialog ends without concluding.
    fn best_effort(&self, transcript: &[DialogTurn]) -> Vec<Requirement> {
        transcript
            .iter()
            .filter(|t| !t.fallback)
            .map(|t| Requirement::user(t.answer.clone()))
            .collect()
    }
}

/// Answers that end the interview early.
const FINISH_PHRASES: &[&str] = &["keep it simple", "proceed", "that's all", "nothing else"];

/// Walks a fixed topic list, one question per topic.
#[derive(Debug, Clone)]
pub struct ChecklistInterviewer {
    topics: Vec<String>,
}

impl ChecklistInterviewer {
    #[must_use]
    pub fn new(topics: Vec<String>) -> Self {
        Self { topics }
    }

    fn wants_to_finish(answer: &str) -> bool {
        let answer = answer.to_lowercase();
        FINISH_PHRASES.iter().any(|p| answer.contains(p))
    }

    fn conclude(transcript: &[DialogTurn]) -> Vec<Requirement> {
        transcript
            .iter()
            .filter_map(|t| {
                if t.fallback {
                    Some(Requirement::agent(format!(
                        "No answer to \"{}\"; using reasonable assumptions.",
                        t.question
                    )))
                } else if Self::wants_to_finish(&t.answer) && t.answer.split_whitespace().count() <= 4 {
                    None
                } else {
                    Some(Requirement::user(t.answer.clone()))
                }
            })
            .collect()
    }
}

impl Interviewer for ChecklistInterviewer {
    fn next_step(&self, _initial_request: &str, transcript: &[DialogTurn]) -> Step {
        let finished_early = transcript
            .last()
            .is_some_and(|t| !t.fallback && Self::wants_to_finish(&t.answer));
        if finished_early || transcript.len() >= self.topics.len() {
            return Step::Conclude(Self::conclude(transcript));
        }
        Step::Ask(self.topics[transcript.len()].clone())
    }
}
