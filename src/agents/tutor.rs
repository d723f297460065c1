//! Conversational tutor agent

use super::AgentError;
use crate::llm::retry::RetryPolicy;
use crate::llm::{ChatTurn, CompletionRequest, CompletionService};
use std::sync::Arc;

/// Most recent turns of history included in each request. Older turns are
/// silently dropped.
pub const HISTORY_WINDOW: usize = 10;

const SYSTEM_PROMPT: &str = "\
You are an expert AI tutor and learning companion.

Your role:
- Explain concepts clearly with examples
- Break down complex topics into simple parts
- Encourage critical thinking with questions
- Provide practice problems when requested
- Give constructive, encouraging feedback
- Adapt explanations to student's level

Guidelines:
- Be patient, supportive, and encouraging
- Use analogies and real-world examples
- Ask follow-up questions to check understanding
- Celebrate progress and learning
- Keep responses under 300 words unless explaining complex topics
- Format code and math clearly";

/// The tutor composes system prompt + bounded history + the new message
/// and returns the model's reply as free text, unmodified.
#[derive(Clone)]
pub struct TutorAgent {
    service: Arc<dyn CompletionService>,
    retry: RetryPolicy,
    max_tokens: u32,
    temperature: f32,
}

impl TutorAgent {
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

    /// Respond to a message, given prior conversation turns. Only the last
    /// [`HISTORY_WINDOW`] turns are sent upstream.
    pub async fn respond(
        &self,
        message: &str,
        history: &[ChatTurn],
    ) -> Result<String, AgentError> {
        let request = self.build_request(message, history);
        let reply = self.retry.run(|| self.service.complete(&request)).await?;
        Ok(reply)
    }

    fn build_request(&self, message: &str, history: &[ChatTurn]) -> CompletionRequest {
        let start = history.len().saturating_sub(HISTORY_WINDOW);
        let mut messages: Vec<ChatTurn> = history[start..].to_vec();
        messages.push(ChatTurn::user(message));

        CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}
