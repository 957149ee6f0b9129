//! Persistence layer.
//!
//! Each entity has its own store trait (`UserStore`, `AppointmentStore`, …)
//! implemented for [`PgStore`] next to the trait and for
//! [`memory::MemoryStore`] in one place. Handlers only see
//! `Arc<dyn AppStore>`, so the backend is picked once at startup from the
//! database URL scheme.
//!
//! Queries use the runtime-checked `sqlx::query` form so that no
//! `DATABASE_URL` is needed at compile time.

pub mod appointment;
pub mod chat;
pub mod dao;
pub mod interaction;
pub mod memory;
pub mod session;
pub mod user;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

pub use appointment::AppointmentStore;
pub use chat::ChatStore;
pub use dao::{AppointmentFilter, AppointmentRecord, ChatMessage, ChatSession, InteractionLog, UserRecord};
pub use interaction::InteractionStore;
pub use memory::MemoryStore;
pub use session::SessionStore;
pub use user::UserStore;

/// URL scheme that selects [`MemoryStore`] instead of Postgres.
pub const MEMORY_URL_SCHEME: &str = "memory://";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated; carries the constraint name.
    #[error("conflict on {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    /// A foreign key pointed at a missing row.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// A stored value could not be decoded into its domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            let constraint = db.constraint().unwrap_or("unknown").to_owned();
            if db.is_unique_violation() {
                return StoreError::Conflict(constraint);
            }
            if db.is_foreign_key_violation() {
                return StoreError::InvalidReference(constraint);
            }
        }
        StoreError::Database(e)
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        StoreError::Database(sqlx::Error::Migrate(Box::new(e)))
    }
}

/// Constraint names the service layer maps to domain errors.
pub mod constraints {
    pub const USER_EMAIL: &str = "users_email_key";
    pub const PROVIDER_SLOT: &str = "appointments_provider_slot_key";
}

/// Parse a text column into a strum-backed enum.
pub(crate) fn parse_column<T: FromStr>(column: &str, value: &str) -> Result<T, StoreError> {
    value
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("{column} = '{value}'")))
}

/// Everything the server needs from persistence.
#[async_trait]
pub trait AppStore: UserStore + AppointmentStore + SessionStore + ChatStore + InteractionStore {
    /// Short label for logs and health output.
    fn backend(&self) -> &'static str;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Postgres-backed store.
#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(url)
            .await?;
        Ok(Self { pool })
    }

    /// Apply pending migrations from `./migrations` (embedded at compile time).
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[cfg(test)]
impl PgStore {
    /// A store whose pool never reaches a server, for exercising failure paths.
    pub(crate) fn unreachable() -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_millis(300))
            .connect_lazy("postgres://slotwise@127.0.0.1:1/slotwise")
            .unwrap();
        Self { pool }
    }
}

#[async_trait]
impl AppStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Open the store named by `url` and bring its schema up to date.
pub async fn connect(url: &str, max_connections: u32) -> Result<Arc<dyn AppStore>, StoreError> {
    if url.starts_with(MEMORY_URL_SCHEME) {
        info!("using in-memory store; data is lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = PgStore::connect(url, max_connections).await?;
    store.migrate().await?;
    info!("postgres store ready, migrations applied");
    Ok(Arc::new(store))
}
