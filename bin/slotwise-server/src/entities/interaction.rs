use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::{InteractionLog, PgStore, StoreError};

#[async_trait]
pub trait InteractionStore: Send + Sync + 'static {
    async fn log_interaction(&self, log: &InteractionLog) -> Result<(), StoreError>;

    /// Newest first, optionally restricted to one user.
    async fn list_interactions(&self, user_id: Option<Uuid>, limit: usize) -> Result<Vec<InteractionLog>, StoreError>;
}

fn interaction_from_row(row: &PgRow) -> Result<InteractionLog, StoreError> {
    Ok(InteractionLog {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        user_id: row.try_get("user_id")?,
        kind: row.try_get("kind")?,
        request: row.try_get("request")?,
        response: row.try_get("response")?,
        latency_ms: row.try_get("latency_ms")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl InteractionStore for PgStore {
    async fn log_interaction(&self, log: &InteractionLog) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO interaction_logs (id, session_id, user_id, kind, request, response, latency_ms, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(log.id)
        .bind(log.session_id)
        .bind(log.user_id)
        .bind(&log.kind)
        .bind(&log.request)
        .bind(&log.response)
        .bind(log.latency_ms)
        .bind(log.created_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn list_interactions(&self, user_id: Option<Uuid>, limit: usize) -> Result<Vec<InteractionLog>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            SELECT * FROM interaction_logs
            WHERE ($1::uuid IS NULL OR user_id = $1)
            ORDER BY created_at DESC, id
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(interaction_from_row).collect()
    }
}
