//! Mock LLM client for tests: canned replies, no network.

use crate::llm::{LLMClient, LLMError, Message};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Replies with a fixed completion, or fails every call.
pub struct MockLLMClient {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl MockLLMClient {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Ok(text.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of completions requested so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LLMClient for MockLLMClient {
    async fn chat(&self, _messages: &[Message]) -> Result<String, LLMError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone().map_err(LLMError::Api)
    }
}
