//! LLM abstraction used by the agent loop.
//!
//! [`LlmClient`] is one request/response round-trip with tool schemas
//! attached. History management and the tool loop live in
//! [`crate::agent`]; providers stay stateless.

pub mod dummy;
pub mod openai_compatible;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use slotwise_types::MessageRole;
use tracing::{info, warn};

use crate::error::AgentError;

pub use dummy::DummyProvider;
pub use openai_compatible::OpenAiCompatibleProvider;

/// A message as the agent sends it to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: Option<String>,
    /// Set on assistant messages that requested tools.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Set on tool-result messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ConversationMessage {
    pub fn text(role: MessageRole, content: impl Into<String>) -> Self {
        Self { role, content: Some(content.into()), tool_calls: Vec::new(), tool_call_id: None }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(MessageRole::User, content)
    }

    pub fn assistant_tool_calls(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self { role: MessageRole::Assistant, content, tool_calls, tool_call_id: None }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Decoded arguments; a string when the model sent malformed JSON.
    pub arguments: serde_json::Value,
}

/// Tool description advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object.
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub messages: Vec<ConversationMessage>,
    pub tools: Vec<ToolSchema>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<LlmUsage>,
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl LlmUsage {
    pub fn add(&mut self, other: LlmUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync + 'static {
    /// Short provider label for logs and health output.
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    async fn chat(&self, request: LlmRequest) -> Result<LlmReply, AgentError>;
}

/// Which provider implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ProviderKind {
    /// Any `/chat/completions` endpoint speaking the OpenAI tool-call format.
    #[strum(serialize = "openai", serialize = "openai_compatible")]
    OpenAi,
    /// Offline echo provider for keyless development.
    Dummy,
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    /// Base URL up to and including the API version, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub timeout_secs: u64,
}

/// Construct the configured provider.
///
/// An OpenAI provider without an API key pointed at the public OpenAI host
/// cannot work, so it falls back to [`DummyProvider`] with a warning.
pub fn build_provider(settings: &LlmSettings) -> Result<Arc<dyn LlmClient>, AgentError> {
    match settings.provider {
        ProviderKind::Dummy => {
            info!("using dummy llm provider");
            Ok(Arc::new(DummyProvider))
        }
        ProviderKind::OpenAi => {
            if settings.api_key.is_none() && settings.base_url.contains("api.openai.com") {
                warn!("no LLM API key configured; falling back to the dummy provider");
                return Ok(Arc::new(DummyProvider));
            }
            let provider = OpenAiCompatibleProvider::new(
                settings.base_url.clone(),
                settings.model.clone(),
                settings.temperature,
                settings.timeout_secs,
                settings.api_key.clone(),
            )?;
            info!(base_url = %settings.base_url, model = %settings.model, "using openai-compatible llm provider");
            Ok(Arc::new(provider))
        }
    }
}
