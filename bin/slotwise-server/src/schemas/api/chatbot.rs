use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use slotwise_agent::ToolInvocation;
use slotwise_types::MessageRole;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{ChatMessage, ChatSession};

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(max = 200))]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteSessionResponse {
    pub deleted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub session_id: Uuid,
    #[schema(value_type = String, example = "assistant")]
    pub role: MessageRole,
    pub content: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Request body for `POST /api/chatbot/sessions/{id}/messages`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 1, max = 4000))]
    pub content: String,
}

/// One tool the assistant ran while answering.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ToolCallResponse {
    pub name: String,
    pub arguments: Value,
    pub result: Value,
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SendMessageResponse {
    /// The assistant's answer text.
    pub reply: String,
    /// The stored assistant message.
    pub message: MessageResponse,
    pub tool_calls: Vec<ToolCallResponse>,
}

impl ChatSession {
    pub fn to_response(&self) -> SessionResponse {
        SessionResponse {
            id: self.id,
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl ChatMessage {
    pub fn to_response(&self) -> MessageResponse {
        MessageResponse {
            id: self.id,
            session_id: self.session_id,
            role: self.role,
            content: self.content.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
        }
    }
}

impl From<ToolInvocation> for ToolCallResponse {
    fn from(t: ToolInvocation) -> Self {
        Self { name: t.name, arguments: t.arguments, result: t.result, ok: t.ok }
    }
}
