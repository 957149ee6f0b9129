//! Calendar tools backed by the host's booking service.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use slotwise_types::{AppointmentStatus, BookingError, TimeSlot};
use uuid::Uuid;

use super::{parse_args, Tool, ToolContext, ToolRegistry};
use crate::error::ToolError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderView {
    pub id: Uuid,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentView {
    pub id: Uuid,
    pub provider_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Booking operations the tools delegate to.
///
/// Every call acts for `user_id`; implementations must refuse to touch
/// appointments owned by someone else.
#[async_trait]
pub trait BookingBackend: Send + Sync + 'static {
    async fn list_providers(&self) -> Result<Vec<ProviderView>, BookingError>;

    async fn available_slots(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, BookingError>;

    async fn book(
        &self,
        user_id: Uuid,
        provider_id: Uuid,
        start: DateTime<Utc>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AppointmentView, BookingError>;

    async fn list_for_user(
        &self,
        user_id: Uuid,
        upcoming_only: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentView>, BookingError>;

    async fn cancel(&self, user_id: Uuid, appointment_id: Uuid) -> Result<AppointmentView, BookingError>;

    async fn reschedule(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
        new_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<AppointmentView, BookingError>;
}

/// Register the six calendar tools against `backend`.
pub fn register_booking_tools(registry: &mut ToolRegistry, backend: Arc<dyn BookingBackend>) {
    registry.register(Arc::new(ListProviders(backend.clone())));
    registry.register(Arc::new(CheckAvailability(backend.clone())));
    registry.register(Arc::new(BookAppointment(backend.clone())));
    registry.register(Arc::new(ListMyAppointments(backend.clone())));
    registry.register(Arc::new(CancelAppointment(backend.clone())));
    registry.register(Arc::new(RescheduleAppointment(backend)));
}

struct ListProviders(Arc<dyn BookingBackend>);

#[async_trait]
impl Tool for ListProviders {
    fn name(&self) -> &'static str {
        "list_providers"
    }

    fn description(&self) -> &'static str {
        "List the providers (doctors, consultants) that appointments can be booked with, including their ids."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn call(&self, _ctx: &ToolContext, _args: Value) -> Result<Value, ToolError> {
        let providers = self.0.list_providers().await?;
        Ok(json!({ "providers": providers }))
    }
}

#[derive(Deserialize)]
struct AvailabilityArgs {
    provider_id: Uuid,
    date: NaiveDate,
}

struct CheckAvailability(Arc<dyn BookingBackend>);

#[async_trait]
impl Tool for CheckAvailability {
    fn name(&self) -> &'static str {
        "check_availability"
    }

    fn description(&self) -> &'static str {
        "List the free appointment slots of a provider on a given day."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "provider_id": { "type": "string", "format": "uuid", "description": "Provider id from list_providers" },
                "date": { "type": "string", "format": "date", "description": "Day to check, YYYY-MM-DD" }
            },
            "required": ["provider_id", "date"]
        })
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let args: AvailabilityArgs = parse_args(args)?;
        let slots = self.0.available_slots(args.provider_id, args.date, ctx.now).await?;
        Ok(json!({
            "provider_id": args.provider_id,
            "date": args.date,
            "free_slots": slots,
        }))
    }
}

#[derive(Deserialize)]
struct BookArgs {
    provider_id: Uuid,
    start_time: DateTime<Utc>,
    #[serde(default)]
    reason: Option<String>,
}

struct BookAppointment(Arc<dyn BookingBackend>);

#[async_trait]
impl Tool for BookAppointment {
    fn name(&self) -> &'static str {
        "book_appointment"
    }

    fn description(&self) -> &'static str {
        "Book an appointment for the current user. Only call this after the user confirmed the provider and time."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "provider_id": { "type": "string", "format": "uuid" },
                "start_time": { "type": "string", "format": "date-time", "description": "Slot start, RFC 3339 in UTC" },
                "reason": { "type": "string", "description": "Short reason for the visit" }
            },
            "required": ["provider_id", "start_time"]
        })
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let args: BookArgs = parse_args(args)?;
        let reason = args.reason.filter(|r| !r.trim().is_empty());
        let appointment = self.0.book(ctx.user_id, args.provider_id, args.start_time, reason, ctx.now).await?;
        Ok(json!({ "booked": appointment }))
    }
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default = "default_upcoming")]
    upcoming_only: bool,
}

fn default_upcoming() -> bool {
    true
}

struct ListMyAppointments(Arc<dyn BookingBackend>);

#[async_trait]
impl Tool for ListMyAppointments {
    fn name(&self) -> &'static str {
        "list_my_appointments"
    }

    fn description(&self) -> &'static str {
        "List the current user's appointments, soonest first."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "upcoming_only": { "type": "boolean", "description": "Only future scheduled appointments (default true)" }
            }
        })
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let args: ListArgs = parse_args(args)?;
        let appointments = self.0.list_for_user(ctx.user_id, args.upcoming_only, ctx.now).await?;
        Ok(json!({ "appointments": appointments }))
    }
}

#[derive(Deserialize)]
struct CancelArgs {
    appointment_id: Uuid,
}

struct CancelAppointment(Arc<dyn BookingBackend>);

#[async_trait]
impl Tool for CancelAppointment {
    fn name(&self) -> &'static str {
        "cancel_appointment"
    }

    fn description(&self) -> &'static str {
        "Cancel one of the current user's scheduled appointments."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "appointment_id": { "type": "string", "format": "uuid" } },
            "required": ["appointment_id"]
        })
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let args: CancelArgs = parse_args(args)?;
        let appointment = self.0.cancel(ctx.user_id, args.appointment_id).await?;
        Ok(json!({ "cancelled": appointment }))
    }
}

#[derive(Deserialize)]
struct RescheduleArgs {
    appointment_id: Uuid,
    new_start_time: DateTime<Utc>,
}

struct RescheduleAppointment(Arc<dyn BookingBackend>);

#[async_trait]
impl Tool for RescheduleAppointment {
    fn name(&self) -> &'static str {
        "reschedule_appointment"
    }

    fn description(&self) -> &'static str {
        "Move one of the current user's scheduled appointments to a new free slot with the same provider."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "appointment_id": { "type": "string", "format": "uuid" },
                "new_start_time": { "type": "string", "format": "date-time", "description": "New slot start, RFC 3339 in UTC" }
            },
            "required": ["appointment_id", "new_start_time"]
        })
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError> {
        let args: RescheduleArgs = parse_args(args)?;
        let appointment = self.0.reschedule(ctx.user_id, args.appointment_id, args.new_start_time, ctx.now).await?;
        Ok(json!({ "rescheduled": appointment }))
    }
}
