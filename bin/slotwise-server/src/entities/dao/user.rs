use chrono::{DateTime, Utc};
use serde_json::Value;
use slotwise_types::UserRole;
use uuid::Uuid;

/// A row in the `users` table.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    /// Stored as entered; uniqueness is case-insensitive.
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub full_name: String,
    pub role: UserRole,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
