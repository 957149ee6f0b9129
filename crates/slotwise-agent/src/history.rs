use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slotwise_types::MessageRole;
use uuid::Uuid;

use crate::error::AgentError;
use crate::llm::ConversationMessage;

/// One persisted conversation turn (a user or assistant message).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// Free-form annotations, e.g. the tools an assistant turn invoked.
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: MessageRole, content: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            created_at,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn to_message(&self) -> ConversationMessage {
        ConversationMessage::text(self.role, self.content.clone())
    }
}

/// Durable conversation history, implemented by the host's database layer.
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    /// The newest `limit` turns of a session, oldest first.
    async fn load_recent(&self, session_id: Uuid, limit: usize) -> Result<Vec<Turn>, AgentError>;

    async fn append(&self, session_id: Uuid, turn: &Turn) -> Result<(), AgentError>;
}
