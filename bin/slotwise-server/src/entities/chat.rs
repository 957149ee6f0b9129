use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::{parse_column, ChatMessage, PgStore, StoreError};

#[async_trait]
pub trait ChatStore: Send + Sync + 'static {
    async fn append_message(&self, message: &ChatMessage) -> Result<(), StoreError>;

    /// Every message of the session in creation order.
    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, StoreError>;

    /// The newest `limit` messages, returned oldest first.
    async fn recent_messages(&self, session_id: Uuid, limit: usize) -> Result<Vec<ChatMessage>, StoreError>;
}

fn message_from_row(row: &PgRow) -> Result<ChatMessage, StoreError> {
    let role: String = row.try_get("role")?;
    Ok(ChatMessage {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        role: parse_column("role", &role)?,
        content: row.try_get("content")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl ChatStore for PgStore {
    async fn append_message(&self, message: &ChatMessage) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, session_id, role, content, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(message.id)
        .bind(message.session_id)
        .bind(message.role.as_ref())
        .bind(&message.content)
        .bind(&message.metadata)
        .bind(message.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, StoreError> {
        let rows = sqlx::query("SELECT * FROM chat_messages WHERE session_id = $1 ORDER BY created_at, id")
            .bind(session_id)
            .fetch_all(self.pool())
            .await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn recent_messages(&self, session_id: Uuid, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT * FROM (
                SELECT * FROM chat_messages WHERE session_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
            ) recent
            ORDER BY created_at, id
            "#,
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(message_from_row).collect()
    }
}
