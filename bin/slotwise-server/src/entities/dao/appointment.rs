use chrono::{DateTime, Utc};
use serde_json::Value;
use slotwise_types::AppointmentStatus;
use uuid::Uuid;

/// A row in the `appointments` table.
#[derive(Debug, Clone)]
pub struct AppointmentRecord {
    pub id: Uuid,
    /// The patient who booked.
    pub user_id: Uuid,
    pub provider_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Conjunctive filter for appointment listings. `None` fields match anything.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub user_id: Option<Uuid>,
    pub provider_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    /// Only appointments starting strictly after this instant.
    pub starts_after: Option<DateTime<Utc>>,
}

impl AppointmentFilter {
    pub fn matches(&self, a: &AppointmentRecord) -> bool {
        self.user_id.is_none_or(|id| a.user_id == id)
            && self.provider_id.is_none_or(|id| a.provider_id == id)
            && self.status.is_none_or(|s| a.status == s)
            && self.starts_after.is_none_or(|t| a.start_time > t)
    }
}
