use serde::{Deserialize, Serialize};
use uuid::Uuid;
use utoipa::ToSchema;
use validator::Validate;

use crate::schemas::api::chatbot::ToolCallResponse;

/// Request body for `POST /ai/chat/process`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct ProcessChatRequest {
    pub session_id: Uuid,
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 4000))]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessChatResponse {
    pub reply: String,
    pub tool_calls: Vec<ToolCallResponse>,
    /// Model calls made for this turn.
    pub rounds: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CacheStatsResponse {
    pub sessions: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AiHealthResponse {
    pub status: String,
    pub provider: String,
    pub model: String,
    pub tools: Vec<String>,
    pub cache: CacheStatsResponse,
}
