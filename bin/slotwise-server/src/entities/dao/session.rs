use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A row in the `chat_sessions` table.
#[derive(Debug, Clone)]
pub struct ChatSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    /// Bumped on every processed turn.
    pub updated_at: DateTime<Utc>,
}
