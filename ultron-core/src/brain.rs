//! Brain module — the reasoning delegate abstraction.
//!
//! Defines the `LlmProvider` trait used for fallback persona routing, deep
//! reasoning, thesis generation and quick thoughts, plus a scripted mock for
//! tests.

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Trait for reasoning delegates: role-tagged messages in, one completion out.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;

    /// Convenience wrapper: single user prompt in, trimmed text out.
    async fn complete_text(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self
            .complete(CompletionRequest::from_prompt(prompt))
            .await?;
        Ok(response.text().to_string())
    }
}

/// One scripted reply of the mock delegate.
#[derive(Debug, Clone)]
pub enum MockReply {
    Text(String),
    Fail(String),
}

/// A mock delegate for testing that returns queued replies in order.
///
/// When the queue is empty, the fallback reply is returned.
pub struct MockLlmProvider {
    model: String,
    replies: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    prompts: Mutex<Vec<String>>,
    call_count: AtomicUsize,
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            replies: Mutex::new(VecDeque::new()),
            fallback: MockReply::Text("I'm a mock LLM. No queued responses available.".into()),
            prompts: Mutex::new(Vec::new()),
            call_count: AtomicUsize::new(0),
        }
    }

    /// A mock that always answers with the given text.
    pub fn with_response(text: &str) -> Self {
        Self {
            fallback: MockReply::Text(text.to_string()),
            ..Self::new()
        }
    }

    /// A mock whose every call fails with `LlmError::ApiRequest`.
    pub fn failing(message: &str) -> Self {
        Self {
            fallback: MockReply::Fail(message.to_string()),
            ..Self::new()
        }
    }

    /// Queue a reply to be returned by the next `complete` call.
    pub fn queue_response(&self, reply: MockReply) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(reply);
    }

    /// Queue a text reply.
    pub fn queue_text(&self, text: &str) {
        self.queue_response(MockReply::Text(text.to_string()));
    }

    /// Number of times `complete` was called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Concatenated message contents of every request received, in order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Create a simple text response.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt);

        let reply = self
            .replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            MockReply::Text(text) => Ok(Self::text_response(&text)),
            MockReply::Fail(message) => Err(LlmError::ApiRequest { message }),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
