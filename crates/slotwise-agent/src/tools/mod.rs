//! Tools the model may call, and the registry that dispatches them.

pub mod booking;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ToolError;
use crate::llm::{ToolCall, ToolSchema};

pub use booking::{register_booking_tools, AppointmentView, BookingBackend, ProviderView};

/// Who a tool runs on behalf of.
#[derive(Debug, Clone, Copy)]
pub struct ToolContext {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait Tool: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema of the arguments object.
    fn parameters(&self) -> Value;

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError>;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Result of dispatching one tool call, ready to be fed back to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub ok: bool,
    pub value: Value,
}

/// Fixed set of tools, built once at startup.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any previous tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas of every registered tool, sorted by name so prompts are stable.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Run `call`; failures are folded into an `{"error": ...}` value.
    pub async fn dispatch(&self, ctx: &ToolContext, call: &ToolCall) -> ToolOutcome {
        let result = match self.tools.get(call.name.as_str()) {
            Some(tool) => tool.call(ctx, call.arguments.clone()).await,
            None => Err(ToolError::UnknownTool(call.name.clone())),
        };
        match result {
            Ok(value) => {
                debug!(tool = %call.name, session_id = %ctx.session_id, "tool call succeeded");
                ToolOutcome { ok: true, value }
            }
            Err(e) => {
                if let ToolError::Backend(detail) = &e {
                    warn!(tool = %call.name, error = %detail, "tool backend failure");
                } else {
                    debug!(tool = %call.name, error = %e, "tool call refused");
                }
                ToolOutcome { ok: false, value: json!({ "error": e.to_string() }) }
            }
        }
    }
}

/// Decode tool arguments into `T`, mapping serde errors to [`ToolError`].
pub(crate) fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    // Some models send `null` for tools without parameters.
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;

    struct Shout;

    #[async_trait]
    impl Tool for Shout {
        fn name(&self) -> &'static str {
            "shout"
        }

        fn description(&self) -> &'static str {
            "Upper-case the given text"
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"text": {"type": "string"}}, "required": ["text"]})
        }

        async fn call(&self, _ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
            #[derive(serde::Deserialize)]
            struct Args {
                text: String,
            }
            let args: Args = parse_args(args)?;
            Ok(json!({ "text": args.text.to_uppercase() }))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext { user_id: Uuid::new_v4(), session_id: Uuid::new_v4(), now: Utc::now() }
    }

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall { id: "call_0".into(), name: name.into(), arguments }
    }

    #[tokio::test]
    async fn dispatches_by_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Shout));
        let outcome = registry.dispatch(&ctx(), &call("shout", json!({"text": "hi"}))).await;
        assert_eq!(outcome, ToolOutcome { ok: true, value: json!({"text": "HI"}) });
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_arguments_become_error_values() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Shout));

        let unknown = registry.dispatch(&ctx(), &call("whisper", json!({}))).await;
        assert!(!unknown.ok);
        assert_eq!(unknown.value["error"], "unknown tool 'whisper'");

        let bad = registry.dispatch(&ctx(), &call("shout", json!("not an object"))).await;
        assert!(!bad.ok);
        assert!(bad.value["error"].as_str().unwrap().starts_with("invalid arguments"));
    }

    #[test]
    fn schemas_are_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Shout));
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "shout");
        assert_eq!(schemas[0].parameters["required"][0], "text");
    }
}
