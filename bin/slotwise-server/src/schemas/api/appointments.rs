use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use slotwise_types::{AppointmentStatus, TimeSlot};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::entities::{AppointmentRecord, UserRecord};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderResponse {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
}

/// Request body for `POST /api/appointments`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateAppointmentRequest {
    pub provider_id: Uuid,
    /// Must be on the slot grid, inside opening hours and in the future.
    pub start_time: DateTime<Utc>,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
    pub metadata: Option<Value>,
}

/// Request body for `PUT /api/appointments/{id}`. Absent fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateAppointmentRequest {
    pub start_time: Option<DateTime<Utc>>,
    #[validate(length(max = 1000))]
    pub reason: Option<String>,
    #[schema(value_type = Option<String>, example = "completed")]
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListAppointmentsQuery {
    /// `scheduled`, `cancelled` or `completed`.
    #[param(value_type = Option<String>)]
    pub status: Option<AppointmentStatus>,
    /// Only scheduled appointments that have not started yet.
    pub upcoming: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    pub provider_id: Uuid,
    /// Calendar day, `YYYY-MM-DD`, in UTC.
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppointmentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub provider_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[schema(value_type = String, example = "scheduled")]
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SlotResponse {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityResponse {
    pub provider_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<SlotResponse>,
}

impl AppointmentRecord {
    pub fn to_response(&self) -> AppointmentResponse {
        AppointmentResponse {
            id: self.id,
            user_id: self.user_id,
            provider_id: self.provider_id,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
            reason: self.reason.clone(),
            metadata: self.metadata.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl UserRecord {
    pub fn to_provider_response(&self) -> ProviderResponse {
        ProviderResponse { id: self.id, full_name: self.full_name.clone(), email: self.email.clone() }
    }
}

impl From<TimeSlot> for SlotResponse {
    fn from(slot: TimeSlot) -> Self {
        Self { start: slot.start, end: slot.end }
    }
}
