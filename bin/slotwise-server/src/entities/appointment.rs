use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slotwise_types::AppointmentStatus;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{parse_column, AppointmentFilter, AppointmentRecord, PgStore, StoreError};

#[async_trait]
pub trait AppointmentStore: Send + Sync + 'static {
    /// Insert a booking. A second live booking of the same provider slot is a
    /// [`StoreError::Conflict`] on the provider-slot constraint.
    async fn insert_appointment(&self, appointment: &AppointmentRecord) -> Result<(), StoreError>;

    async fn get_appointment(&self, id: Uuid) -> Result<Option<AppointmentRecord>, StoreError>;

    /// Matching appointments ordered by start time.
    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<AppointmentRecord>, StoreError>;

    /// Overwrite the mutable fields (times, status, reason, metadata).
    async fn update_appointment(&self, appointment: &AppointmentRecord) -> Result<(), StoreError>;

    /// Start times of the provider's non-cancelled bookings in `[from, to)`.
    async fn booked_starts(
        &self,
        provider_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError>;
}

fn appointment_from_row(row: &PgRow) -> Result<AppointmentRecord, StoreError> {
    let status: String = row.try_get("status")?;
    Ok(AppointmentRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        provider_id: row.try_get("provider_id")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        status: parse_column("status", &status)?,
        reason: row.try_get("reason")?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl AppointmentStore for PgStore {
    async fn insert_appointment(&self, a: &AppointmentRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO appointments
                (id, user_id, provider_id, start_time, end_time, status, reason, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(a.id)
        .bind(a.user_id)
        .bind(a.provider_id)
        .bind(a.start_time)
        .bind(a.end_time)
        .bind(a.status.as_ref())
        .bind(&a.reason)
        .bind(&a.metadata)
        .bind(a.created_at)
        .bind(a.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<AppointmentRecord>, StoreError> {
        let row = sqlx::query("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<AppointmentRecord>, StoreError> {
        let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT * FROM appointments WHERE TRUE");
        if let Some(user_id) = filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(provider_id) = filter.provider_id {
            query.push(" AND provider_id = ").push_bind(provider_id);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_ref().to_owned());
        }
        if let Some(after) = filter.starts_after {
            query.push(" AND start_time > ").push_bind(after);
        }
        query.push(" ORDER BY start_time, id");
        let rows = query.build().fetch_all(self.pool()).await?;
        rows.iter().map(appointment_from_row).collect()
    }

    async fn update_appointment(&self, a: &AppointmentRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE appointments
            SET start_time = $1, end_time = $2, status = $3, reason = $4, metadata = $5, updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(a.start_time)
        .bind(a.end_time)
        .bind(a.status.as_ref())
        .bind(&a.reason)
        .bind(&a.metadata)
        .bind(a.updated_at)
        .bind(a.id)
        .execute(self.pool())
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("appointment"));
        }
        Ok(())
    }

    async fn booked_starts(
        &self,
        provider_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT start_time FROM appointments
            WHERE provider_id = $1 AND status <> $2 AND start_time >= $3 AND start_time < $4
            ORDER BY start_time
            "#,
        )
        .bind(provider_id)
        .bind(AppointmentStatus::Cancelled.as_ref())
        .bind(from)
        .bind(to)
        .fetch_all(self.pool())
        .await?;
        rows.iter()
            .map(|r| r.try_get("start_time").map_err(StoreError::from))
            .collect()
    }
}
