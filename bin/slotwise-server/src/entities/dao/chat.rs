use chrono::{DateTime, Utc};
use serde_json::Value;
use slotwise_types::MessageRole;
use uuid::Uuid;

/// A row in the `chat_messages` table.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// For assistant messages: the tool calls made while producing them.
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}
