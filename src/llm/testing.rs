//! Scripted completion service for tests

use super::{CompletionRequest, CompletionService, LlmError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Completion stub that replays a scripted sequence of results and records
/// every request it receives.
pub struct ScriptedService {
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedService {
    pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Stub that always returns the same reply
    pub fn always(reply: &str) -> Self {
        Self::new(vec![Ok(reply.to_string())])
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests captured so far, in call order
    pub fn captured_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let mut replies = self.replies.lock().unwrap();
        match replies.len() {
            0 => Err(LlmError::unknown("scripted replies exhausted")),
            // Keep replaying the final entry once the script runs out
            1 => replies.front().cloned().unwrap(),
            _ => replies.pop_front().unwrap(),
        }
    }

    fn model_id(&self) -> &str {
        "scripted-test-model"
    }
}
