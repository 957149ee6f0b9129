//! Dummy LLM provider: echoes the latest user message prefixed with `[echo]`.
//! Used for running the full chat round-trip without an API key.

use async_trait::async_trait;
use slotwise_types::MessageRole;

use super::{LlmClient, LlmReply, LlmRequest};
use crate::error::AgentError;

#[derive(Debug, Clone, Copy, Default)]
pub struct DummyProvider;

#[async_trait]
impl LlmClient for DummyProvider {
    fn name(&self) -> &str {
        "dummy"
    }

    fn model(&self) -> &str {
        "echo"
    }

    async fn chat(&self, request: LlmRequest) -> Result<LlmReply, AgentError> {
        let last_user = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .and_then(|m| m.content.as_deref())
            .unwrap_or_default();
        Ok(LlmReply {
            content: Some(format!("[echo] {last_user}")),
            tool_calls: Vec::new(),
            usage: None,
        })
    }
}
