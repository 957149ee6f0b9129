use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::entities::InteractionLog;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InteractionQuery {
    /// Only this user's interactions.
    pub user_id: Option<Uuid>,
    /// At most this many, newest first (default 50, max 500).
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InteractionResponse {
    pub id: Uuid,
    pub session_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub kind: String,
    pub request: Value,
    pub response: Value,
    pub latency_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl InteractionLog {
    pub fn to_response(&self) -> InteractionResponse {
        InteractionResponse {
            id: self.id,
            session_id: self.session_id,
            user_id: self.user_id,
            kind: self.kind.clone(),
            request: self.request.clone(),
            response: self.response.clone(),
            latency_ms: self.latency_ms,
            created_at: self.created_at,
        }
    }
}
