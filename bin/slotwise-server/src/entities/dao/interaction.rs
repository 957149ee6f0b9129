use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A row in the `interaction_logs` table.
#[derive(Debug, Clone)]
pub struct InteractionLog {
    pub id: Uuid,
    pub session_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    /// e.g. `"chat_turn"`.
    pub kind: String,
    pub request: Value,
    pub response: Value,
    pub latency_ms: i64,
    pub created_at: DateTime<Utc>,
}
