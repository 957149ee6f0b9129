//! OpenAI-compatible chat completion provider (`{base}/chat/completions`).
//!
//! Speaks the `tools` / `tool_calls` function-calling format. All wire types
//! are private to this module; callers only see [`LlmRequest`] and
//! [`LlmReply`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use slotwise_types::MessageRole;
use tracing::{debug, error, trace};

use super::{ConversationMessage, LlmClient, LlmReply, LlmRequest, LlmUsage, ToolCall, ToolSchema};
use crate::error::AgentError;

/// Adapter for any HTTP endpoint implementing `/chat/completions`.
///
/// Covers OpenAI itself and compatible local servers (Ollama, LM Studio,
/// vLLM). Cheap to clone because `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        base_url: String,
        model: String,
        temperature: f32,
        timeout_secs: u64,
        api_key: Option<String>,
    ) -> Result<Self, AgentError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Ok(Self { client, endpoint, model, temperature, api_key })
    }

    fn build_payload(&self, request: &LlmRequest) -> ChatCompletionRequest {
        // The gpt-5 family rejects an explicit temperature.
        let temperature = if self.model.starts_with("gpt-5") { None } else { Some(self.temperature) };
        let tools: Vec<WireTool> = request.tools.iter().map(WireTool::from).collect();
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tool_choice: if tools.is_empty() { None } else { Some("auto") },
            tools,
            temperature,
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn chat(&self, request: LlmRequest) -> Result<LlmReply, AgentError> {
        let payload = self.build_payload(&request);
        debug!(
            model = %payload.model,
            messages = payload.messages.len(),
            tools = payload.tools.len(),
            "sending LLM request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full LLM request payload");
        }

        let mut req = self.client.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.endpoint, error = %e, timeout = e.is_timeout(), "LLM HTTP request failed (transport)");
            AgentError::Provider(e.to_string())
        })?;
        let response = check_status(response).await?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize LLM response");
            AgentError::Provider(format!("failed to parse response body: {e}"))
        })?;
        debug!(choices = parsed.choices.len(), "received LLM response");

        into_reply(parsed)
    }
}

fn into_reply(parsed: ChatCompletionResponse) -> Result<LlmReply, AgentError> {
    let usage = parsed.usage.map(|u| LlmUsage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
    });
    let message = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| AgentError::Provider("response contained no choices".into()))?;

    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCall {
            id: call.id,
            arguments: decode_arguments(&call.function.arguments),
            name: call.function.name,
        })
        .collect();
    let content = message.content.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

    Ok(LlmReply { content, tool_calls, usage })
}

/// Arguments arrive as a JSON-encoded string. An empty string means no
/// arguments; anything unparsable is passed through as a string so the tool
/// can report it.
fn decode_arguments(raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    // Serialised as `null` for assistant messages that only carry tool calls.
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl From<&ConversationMessage> for WireMessage {
    fn from(m: &ConversationMessage) -> Self {
        let role = match m.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };
        let tool_calls = if m.tool_calls.is_empty() {
            None
        } else {
            Some(
                m.tool_calls
                    .iter()
                    .map(|c| WireToolCall {
                        id: c.id.clone(),
                        kind: "function".into(),
                        function: WireFunctionCall {
                            name: c.name.clone(),
                            arguments: c.arguments.to_string(),
                        },
                    })
                    .collect(),
            )
        };
        Self { role, content: m.content.clone(), tool_calls, tool_call_id: m.tool_call_id.clone() }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionDef,
}

impl From<&ToolSchema> for WireTool {
    fn from(t: &ToolSchema) -> Self {
        Self {
            kind: "function",
            function: WireFunctionDef {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct WireFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunctionCall,
}

fn function_kind() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<UsageData>,
}

#[derive(Debug, Deserialize)]
struct UsageData {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Return the response if successful, otherwise a structured provider error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, AgentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());
    let message = describe_error(status.as_u16(), &body);
    error!(%status, %message, "LLM request returned HTTP error");
    Err(AgentError::Provider(message))
}

fn describe_error(status: u16, body: &str) -> String {
    if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(body) {
        let code = env
            .error
            .code
            .map(|v| match v {
                serde_json::Value::String(s) => format!(" [code={s}]"),
                other => format!(" [code={other}]"),
            })
            .unwrap_or_default();
        format!("HTTP {status}{code}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn provider(model: &str) -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new("http://localhost:11434/v1/".into(), model.into(), 0.3, 5, None).unwrap()
    }

    #[test]
    fn endpoint_joins_base_url() {
        assert_eq!(provider("llama3").endpoint, "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn payload_carries_tools_and_tool_messages() {
        let request = LlmRequest {
            messages: vec![
                ConversationMessage::system("sys"),
                ConversationMessage::assistant_tool_calls(
                    None,
                    vec![ToolCall { id: "call_1".into(), name: "list_providers".into(), arguments: json!({}) }],
                ),
                ConversationMessage::tool_result("call_1", "{\"providers\":[]}"),
            ],
            tools: vec![ToolSchema {
                name: "list_providers".into(),
                description: "List providers".into(),
                parameters: json!({"type": "object", "properties": {}}),
            }],
        };
        let payload = serde_json::to_value(provider("llama3").build_payload(&request)).unwrap();

        assert_eq!(payload["tool_choice"], "auto");
        assert_eq!(payload["tools"][0]["type"], "function");
        assert_eq!(payload["tools"][0]["function"]["name"], "list_providers");
        assert_eq!(payload["messages"][1]["content"], serde_json::Value::Null);
        assert_eq!(payload["messages"][1]["tool_calls"][0]["function"]["arguments"], "{}");
        assert_eq!(payload["messages"][2]["role"], "tool");
        assert_eq!(payload["messages"][2]["tool_call_id"], "call_1");
        let temperature = payload["temperature"].as_f64().unwrap();
        assert!((temperature - 0.3).abs() < 1e-6);
    }

    #[test]
    fn gpt5_models_omit_temperature() {
        let payload = serde_json::to_value(provider("gpt-5-mini").build_payload(&LlmRequest::default())).unwrap();
        assert!(payload.get("temperature").is_none());
        assert!(payload.get("tools").is_none());
        assert!(payload.get("tool_choice").is_none());
    }

    #[test]
    fn response_with_tool_calls_is_decoded() {
        let parsed: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "a", "type": "function", "function": {"name": "check_availability", "arguments": "{\"date\":\"2030-01-02\"}"}},
                        {"id": "b", "type": "function", "function": {"name": "list_providers", "arguments": ""}},
                        {"id": "c", "type": "function", "function": {"name": "book_appointment", "arguments": "{oops"}}
                    ]
                }
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 4}
        }))
        .unwrap();
        let reply = into_reply(parsed).unwrap();

        assert!(reply.content.is_none());
        assert_eq!(reply.tool_calls.len(), 3);
        assert_eq!(reply.tool_calls[0].arguments, json!({"date": "2030-01-02"}));
        assert_eq!(reply.tool_calls[1].arguments, json!({}));
        assert_eq!(reply.tool_calls[2].arguments, json!("{oops"));
        assert_eq!(reply.usage, Some(LlmUsage { input_tokens: 12, output_tokens: 4 }));
    }

    #[test]
    fn blank_content_becomes_none_and_missing_choices_error() {
        let parsed: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": "  \n"}}]})).unwrap();
        assert_eq!(into_reply(parsed).unwrap().content, None);

        let empty: ChatCompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(into_reply(empty), Err(AgentError::Provider(_))));
    }

    #[test]
    fn error_envelope_is_summarised() {
        let body = r#"{"error": {"message": "Invalid API key", "code": "invalid_api_key"}}"#;
        assert_eq!(describe_error(401, body), "HTTP 401 [code=invalid_api_key]: Invalid API key");
        assert_eq!(describe_error(502, "bad gateway"), "HTTP 502: bad gateway");
    }
}
