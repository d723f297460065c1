//! OpenAI-compatible chat completions provider

use super::types::{CompletionRequest, Role};
use super::{CompletionService, LlmError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for any endpoint speaking the chat/completions wire format
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base_url: Option<&str>) -> Self {
        let base = base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/');
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            url: format!("{base}/chat/completions"),
        }
    }

    fn translate_request(&self, request: &CompletionRequest) -> WireRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);

        if !request.system.is_empty() {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: request.system.clone(),
            });
        }

        for turn in &request.messages {
            messages.push(WireMessage {
                role: turn.role.as_str().to_string(),
                content: turn.content.clone(),
            });
        }

        WireRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let wire_request = self.translate_request(request);

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<WireErrorResponse>(&body)
                .map(|r| r.error.message)
                .unwrap_or(body);
            return Err(LlmError::from_status(status.as_u16(), message));
        }

        let wire_response: WireResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::unknown(format!("Malformed response envelope: {e}")))?;

        // Only the top choice is used
        wire_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::unknown("No choices in response"))
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct WireChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireErrorResponse {
    error: WireError,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatTurn;

    fn sample_request() -> CompletionRequest {
        CompletionRequest {
            system: "You are a tutor.".to_string(),
            messages: vec![
                ChatTurn::user("Explain recursion"),
                ChatTurn::assistant("Sure!"),
                ChatTurn::user("With an example please"),
            ],
            max_tokens: 1000,
            temperature: 0.7,
        }
    }

    #[test]
    fn system_prompt_is_first_wire_message() {
        let client = OpenAiClient::new("key", "gpt-4o", None);
        let wire = client.translate_request(&sample_request());
        assert_eq!(wire.messages[0].role, "system");
        assert_eq!(wire.messages[0].content, "You are a tutor.");
        assert_eq!(wire.messages.len(), 4);
    }

    #[test]
    fn empty_system_prompt_is_omitted() {
        let client = OpenAiClient::new("key", "gpt-4o", None);
        let mut request = sample_request();
        request.system = String::new();
        let wire = client.translate_request(&request);
        assert_eq!(wire.messages.len(), 3);
        assert_eq!(wire.messages[0].role, "user");
    }

    #[test]
    fn roles_translate_to_wire_strings() {
        let client = OpenAiClient::new("key", "gpt-4o", None);
        let wire = client.translate_request(&sample_request());
        let roles: Vec<&str> = wire.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = OpenAiClient::new("key", "gpt-4o", Some("https://example.com/v1/"));
        assert_eq!(client.url, "https://example.com/v1/chat/completions");
    }

    #[test]
    fn wire_response_parses_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#;
        let parsed: WireResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.choices.into_iter().next().unwrap().message.content,
            Some("hello".to_string())
        );
    }

    #[test]
    fn roundtrip_role_parse() {
        assert_eq!(Role::parse("assistant"), Role::Assistant);
        assert_eq!(Role::parse("system"), Role::System);
        assert_eq!(Role::parse("anything-else"), Role::User);
    }
}
