//! Tutor, practice-problem, and evaluation agents
//!
//! Each agent composes a prompt, invokes the completion client through the
//! retry policy, and post-processes the raw reply. Agents hold no
//! per-request state; they are constructed once at startup and cloned into
//! request handlers.

mod evaluator;
mod parser;
mod problem;
mod tutor;

pub use evaluator::AnswerEvaluator;
pub(crate) use parser::json_block;
pub use parser::parse_problem;
pub use problem::ProblemGenerator;
pub use tutor::{TutorAgent, HISTORY_WINDOW};

use crate::llm::{LlmError, LlmErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A structured practice problem, produced exactly once per successful
/// generation call. Owned by the caller; the agents never persist it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedProblem {
    pub problem_text: String,
    pub hints: Vec<String>,
    pub solution: String,
    pub explanation: String,
}

/// Judgment for a submitted answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    pub is_correct: bool,
    /// 0-100. Current grading maps to exactly 85.0 or 40.0.
    pub score: f64,
    pub feedback: String,
}

/// Requested problem difficulty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced to agent callers.
///
/// Malformed model output is never an error: the parser always degrades to
/// a valid problem instead.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("completion credentials rejected: {0}")]
    Auth(String),
    #[error("generation failed: {0}")]
    GenerationFailed(String),
}

impl From<LlmError> for AgentError {
    fn from(e: LlmError) -> Self {
        match e.kind {
            LlmErrorKind::Auth => AgentError::Auth(e.message),
            _ => AgentError::GenerationFailed(e.message),
        }
    }
}
