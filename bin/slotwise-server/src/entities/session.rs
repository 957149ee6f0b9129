use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::{ChatSession, PgStore, StoreError};

#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    async fn create_session(&self, session: &ChatSession) -> Result<(), StoreError>;

    async fn get_session(&self, id: Uuid) -> Result<Option<ChatSession>, StoreError>;

    /// The user's sessions, most recently active first.
    async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<ChatSession>, StoreError>;

    async fn touch_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError>;

    /// Delete a session and its messages. Returns `false` if it did not exist.
    async fn delete_session(&self, id: Uuid) -> Result<bool, StoreError>;
}

fn session_from_row(row: &PgRow) -> Result<ChatSession, StoreError> {
    Ok(ChatSession {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, session: &ChatSession) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chat_sessions (id, user_id, title, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.title)
        .bind(&session.metadata)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<ChatSession>, StoreError> {
        let row = sqlx::query("SELECT * FROM chat_sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(session_from_row).transpose()
    }

    async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<ChatSession>, StoreError> {
        let rows = sqlx::query("SELECT * FROM chat_sessions WHERE user_id = $1 ORDER BY updated_at DESC, id")
            .bind(user_id)
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(session_from_row).collect()
    }

    async fn touch_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("UPDATE chat_sessions SET updated_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, StoreError> {
        // chat_messages rows go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
