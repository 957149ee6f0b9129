use async_trait::async_trait;
use slotwise_types::UserRole;
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

use super::{parse_column, PgStore, StoreError, UserRecord};

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Insert a new user. A duplicate email (ignoring case) is a
    /// [`StoreError::Conflict`].
    async fn create_user(&self, user: &UserRecord) -> Result<(), StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError>;

    /// Case-insensitive lookup.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    /// Users with `role`, ordered by name.
    async fn list_users_by_role(&self, role: UserRole) -> Result<Vec<UserRecord>, StoreError>;
}

const USER_COLUMNS: &str = "id, email, password_hash, full_name, role, metadata, created_at, updated_at";

fn user_from_row(row: &PgRow) -> Result<UserRecord, StoreError> {
    let role: String = row.try_get("role")?;
    Ok(UserRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        full_name: row.try_get("full_name")?,
        role: parse_column("role", &role)?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, full_name, role, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role.as_ref())
        .bind(&user.metadata)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1)"))
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users_by_role(&self, role: UserRole) -> Result<Vec<UserRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE role = $1 ORDER BY full_name, id"
        ))
        .bind(role.as_ref())
        .fetch_all(self.pool())
        .await?;
        rows.iter().map(user_from_row).collect()
    }
}
