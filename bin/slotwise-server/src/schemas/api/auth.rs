use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use slotwise_types::UserRole;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::IssuedToken;
use crate::entities::UserRecord;

/// Request body for `POST /api/auth/register`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    /// `patient` (default) or `provider`.
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "patient")]
    pub role: Option<UserRole>,
}

/// Request body for `POST /api/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 320))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[schema(value_type = String, example = "patient")]
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

/// Returned by register and login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub token: String,
    /// Always `"Bearer"`.
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

impl UserRecord {
    pub fn to_response(&self) -> UserResponse {
        UserResponse {
            id: self.id,
            email: self.email.clone(),
            full_name: self.full_name.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

impl TokenResponse {
    pub fn new(issued: IssuedToken, user: &UserRecord) -> Self {
        Self {
            token: issued.token,
            token_type: "Bearer".into(),
            expires_at: Utc.timestamp_opt(issued.claims.exp, 0).single().unwrap_or_else(Utc::now),
            user: user.to_response(),
        }
    }
}
