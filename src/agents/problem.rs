//! Practice-problem generator agent

use super::{parse_problem, AgentError, Difficulty, GeneratedProblem};
use crate::llm::retry::RetryPolicy;
use crate::llm::{ChatTurn, CompletionRequest, CompletionService};
use std::sync::Arc;

const SYSTEM_PROMPT: &str = r#"You are an expert at creating educational practice problems.

Your task is to generate practice problems in JSON format.

IMPORTANT: Your response must be ONLY valid JSON with this exact structure:
{
    "problem_text": "Clear problem statement here",
    "hints": ["Hint 1", "Hint 2", "Hint 3"],
    "solution": "Complete correct solution",
    "explanation": "Why this solution works"
}

Guidelines:
- Generate clear, well-structured practice problems
- Match difficulty level requested (easy/medium/hard)
- Provide 2-3 progressive hints
- Include complete solution with explanation
- Make problems engaging and relevant

RESPOND WITH ONLY JSON, NO OTHER TEXT."#;

/// Generates structured practice problems. Malformed model output never
/// fails a call; the parser degrades to a best-effort problem instead.
#[derive(Clone)]
pub struct ProblemGenerator {
    service: Arc<dyn CompletionService>,
    retry: RetryPolicy,
    max_tokens: u32,
    temperature: f32,
}

impl ProblemGenerator {
    pub fn new(service: Arc<dyn CompletionService>, max_tokens: u32, temperature: f32) -> Self {
        Self {
            service,
            retry: RetryPolicy::default(),
            max_tokens,
            temperature,
        }
    }

    #[cfg(test)]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
    ) -> Result<GeneratedProblem, AgentError> {
        let prompt = format!(
            "Generate a {difficulty} difficulty practice problem about: {topic}\n\n\
             The problem should be appropriate for a student learning this topic.\n\
             Return ONLY a JSON object with: problem_text, hints (array), solution, explanation"
        );

        let request = CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![ChatTurn::user(prompt)],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let raw = self.retry.run(|| self.service.complete(&request)).await?;
        let problem = parse_problem(&raw);
        tracing::debug!(topic, %difficulty, hints = problem.hints.len(), "problem generated");
        Ok(problem)
    }
}
