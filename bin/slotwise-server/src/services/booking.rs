//! Appointment rules shared by the REST API and the agent's calendar tools.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{json, Value};
use slotwise_agent::{AppointmentView, BookingBackend, ProviderView};
use slotwise_types::{AppointmentStatus, BookingError, BookingHours, TimeSlot, UserRole};
use tracing::info;
use uuid::Uuid;

use crate::entities::{
    constraints, AppStore, AppointmentFilter, AppointmentRecord, AppointmentStore, StoreError, UserRecord, UserStore,
};

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(c) if c == constraints::PROVIDER_SLOT => BookingError::SlotTaken,
            StoreError::NotFound(what) => BookingError::NotFound(what.to_owned()),
            StoreError::InvalidReference(detail) => BookingError::Invalid(format!("unknown reference: {detail}")),
            other => BookingError::Storage(other.to_string()),
        }
    }
}

/// Who is acting on an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: UserRole,
}

impl Actor {
    /// Patients see their own bookings, providers also the bookings with
    /// them, admins everything.
    pub fn can_see(&self, a: &AppointmentRecord) -> bool {
        match self.role {
            UserRole::Admin => true,
            UserRole::Provider => a.user_id == self.id || a.provider_id == self.id,
            UserRole::Patient => a.user_id == self.id,
        }
    }

    fn can_complete(&self, a: &AppointmentRecord) -> bool {
        self.role.is_admin() || (self.role == UserRole::Provider && a.provider_id == self.id)
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub provider_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub reason: Option<String>,
    pub metadata: Value,
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
    pub start_time: Option<DateTime<Utc>>,
    pub reason: Option<String>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListQuery {
    pub status: Option<AppointmentStatus>,
    /// Only scheduled appointments that have not started yet.
    pub upcoming: bool,
}

pub struct BookingService {
    store: Arc<dyn AppStore>,
    hours: BookingHours,
}

impl BookingService {
    pub fn new(store: Arc<dyn AppStore>, hours: BookingHours) -> Self {
        Self { store, hours }
    }

    pub async fn providers(&self) -> Result<Vec<UserRecord>, BookingError> {
        Ok(self.store.list_users_by_role(UserRole::Provider).await?)
    }

    /// Only users with the provider role can be booked.
    async fn provider(&self, provider_id: Uuid) -> Result<UserRecord, BookingError> {
        match self.store.get_user(provider_id).await? {
            Some(user) if user.role == UserRole::Provider => Ok(user),
            _ => Err(BookingError::NotFound("provider".into())),
        }
    }

    pub async fn availability(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, BookingError> {
        self.provider(provider_id).await?;
        let day = self.hours.day_slots(date);
        let (Some(first), Some(last)) = (day.first(), day.last()) else {
            return Ok(Vec::new());
        };
        let booked = self.store.booked_starts(provider_id, first.start, last.end).await?;
        Ok(self.hours.free_slots(date, &booked, now))
    }

    pub async fn book(
        &self,
        patient_id: Uuid,
        request: NewBooking,
        now: DateTime<Utc>,
    ) -> Result<AppointmentRecord, BookingError> {
        if patient_id == request.provider_id {
            return Err(BookingError::Invalid("providers cannot book themselves".into()));
        }
        self.provider(request.provider_id).await?;
        let slot = self.hours.check_start(request.start_time, now)?;
        let appointment = AppointmentRecord {
            id: Uuid::new_v4(),
            user_id: patient_id,
            provider_id: request.provider_id,
            start_time: slot.start,
            end_time: slot.end,
            status: AppointmentStatus::Scheduled,
            reason: clean_reason(request.reason),
            metadata: object_or_empty(request.metadata),
            created_at: now,
            updated_at: now,
        };
        // The provider-slot constraint is the only double-booking guard.
        self.store.insert_appointment(&appointment).await?;
        info!(
            appointment_id = %appointment.id,
            provider_id = %appointment.provider_id,
            start = %appointment.start_time,
            "appointment booked"
        );
        Ok(appointment)
    }

    /// Fetch an appointment the actor may see. Invisible ones are reported
    /// as missing so ids cannot be probed.
    pub async fn get(&self, actor: Actor, id: Uuid) -> Result<AppointmentRecord, BookingError> {
        match self.store.get_appointment(id).await? {
            Some(a) if actor.can_see(&a) => Ok(a),
            _ => Err(BookingError::NotFound("appointment".into())),
        }
    }

    pub async fn list(
        &self,
        actor: Actor,
        query: ListQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentRecord>, BookingError> {
        let mut filter = AppointmentFilter { status: query.status, ..AppointmentFilter::default() };
        if query.upcoming {
            filter.status = Some(AppointmentStatus::Scheduled);
            filter.starts_after = Some(now);
        }
        if actor.role == UserRole::Patient {
            filter.user_id = Some(actor.id);
        }
        let found = self.store.list_appointments(&filter).await?;
        Ok(found.into_iter().filter(|a| actor.can_see(a)).collect())
    }

    pub async fn update(
        &self,
        actor: Actor,
        id: Uuid,
        changes: AppointmentChanges,
        now: DateTime<Utc>,
    ) -> Result<AppointmentRecord, BookingError> {
        let mut appointment = self.get(actor, id).await?;
        if appointment.status != AppointmentStatus::Scheduled {
            return Err(BookingError::Invalid(format!(
                "appointment is {} and can no longer be changed",
                appointment.status
            )));
        }
        if let Some(start) = changes.start_time {
            let slot = self.hours.check_start(start, now)?;
            appointment.start_time = slot.start;
            appointment.end_time = slot.end;
        }
        if let Some(reason) = changes.reason {
            appointment.reason = clean_reason(Some(reason));
        }
        match changes.status {
            None | Some(AppointmentStatus::Scheduled) => {}
            Some(AppointmentStatus::Cancelled) => appointment.status = AppointmentStatus::Cancelled,
            Some(AppointmentStatus::Completed) => {
                if !actor.can_complete(&appointment) {
                    return Err(BookingError::Forbidden("only the provider can complete an appointment".into()));
                }
                appointment.status = AppointmentStatus::Completed;
            }
        }
        appointment.updated_at = now;
        self.store.update_appointment(&appointment).await?;
        info!(appointment_id = %appointment.id, status = %appointment.status, "appointment updated");
        Ok(appointment)
    }

    pub async fn cancel(&self, actor: Actor, id: Uuid, now: DateTime<Utc>) -> Result<AppointmentRecord, BookingError> {
        let changes = AppointmentChanges { status: Some(AppointmentStatus::Cancelled), ..Default::default() };
        self.update(actor, id, changes, now).await
    }

    pub async fn reschedule(
        &self,
        actor: Actor,
        id: Uuid,
        new_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<AppointmentRecord, BookingError> {
        let changes = AppointmentChanges { start_time: Some(new_start), ..Default::default() };
        self.update(actor, id, changes, now).await
    }
}

fn clean_reason(reason: Option<String>) -> Option<String> {
    reason.map(|r| r.trim().to_owned()).filter(|r| !r.is_empty())
}

fn object_or_empty(metadata: Value) -> Value {
    if metadata.is_object() { metadata } else { json!({}) }
}

/// [`BookingBackend`] for the agent. Every call acts as the chatting user in
/// the patient role, so tools only ever touch that user's own bookings.
pub struct AgentBookingBackend {
    service: Arc<BookingService>,
}

impl AgentBookingBackend {
    pub fn new(service: Arc<BookingService>) -> Self {
        Self { service }
    }

    async fn views(&self, records: Vec<AppointmentRecord>) -> Result<Vec<AppointmentView>, BookingError> {
        let names: HashMap<Uuid, String> =
            self.service.providers().await?.into_iter().map(|p| (p.id, p.full_name)).collect();
        Ok(records
            .into_iter()
            .map(|a| {
                let name = names.get(&a.provider_id).cloned();
                to_view(a, name)
            })
            .collect())
    }

    async fn view(&self, record: AppointmentRecord) -> Result<AppointmentView, BookingError> {
        let name = self.service.store.get_user(record.provider_id).await?.map(|p| p.full_name);
        Ok(to_view(record, name))
    }
}

fn to_view(a: AppointmentRecord, provider_name: Option<String>) -> AppointmentView {
    AppointmentView {
        id: a.id,
        provider_id: a.provider_id,
        provider_name,
        start_time: a.start_time,
        end_time: a.end_time,
        status: a.status,
        reason: a.reason,
    }
}

fn patient(user_id: Uuid) -> Actor {
    Actor { id: user_id, role: UserRole::Patient }
}

#[async_trait]
impl BookingBackend for AgentBookingBackend {
    async fn list_providers(&self) -> Result<Vec<ProviderView>, BookingError> {
        let providers = self.service.providers().await?;
        Ok(providers.into_iter().map(|p| ProviderView { id: p.id, full_name: p.full_name }).collect())
    }

    async fn available_slots(
        &self,
        provider_id: Uuid,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<TimeSlot>, BookingError> {
        self.service.availability(provider_id, date, now).await
    }

    async fn book(
        &self,
        user_id: Uuid,
        provider_id: Uuid,
        start: DateTime<Utc>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<AppointmentView, BookingError> {
        let request = NewBooking { provider_id, start_time: start, reason, metadata: json!({ "source": "chat" }) };
        let record = self.service.book(user_id, request, now).await?;
        self.view(record).await
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        upcoming_only: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<AppointmentView>, BookingError> {
        let query = ListQuery { status: None, upcoming: upcoming_only };
        let records = self.service.list(patient(user_id), query, now).await?;
        self.views(records).await
    }

    async fn cancel(&self, user_id: Uuid, appointment_id: Uuid) -> Result<AppointmentView, BookingError> {
        let record = self.service.cancel(patient(user_id), appointment_id, Utc::now()).await?;
        self.view(record).await
    }

    async fn reschedule(
        &self,
        user_id: Uuid,
        appointment_id: Uuid,
        new_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<AppointmentView, BookingError> {
        let record = self.service.reschedule(patient(user_id), appointment_id, new_start, now).await?;
        self.view(record).await
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::entities::{MemoryStore, UserStore};
    use chrono::TimeZone;

    pub(crate) async fn seed_user(store: &dyn AppStore, email: &str, role: UserRole) -> UserRecord {
        let now = Utc::now();
        let user = UserRecord {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: String::new(),
            full_name: email.split('@').next().unwrap_or_default().to_owned(),
            role,
            metadata: json!({}),
            created_at: now,
            updated_at: now,
        };
        store.create_user(&user).await.unwrap();
        user
    }

    fn monday(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 4, hour, minute, 0).unwrap()
    }

    fn booking(provider_id: Uuid, start: DateTime<Utc>) -> NewBooking {
        NewBooking { provider_id, start_time: start, reason: Some("  checkup ".into()), metadata: Value::Null }
    }

    struct Fixture {
        service: BookingService,
        patient: UserRecord,
        other: UserRecord,
        provider: UserRecord,
        now: DateTime<Utc>,
    }

    async fn fixture() -> Fixture {
        let store: Arc<dyn AppStore> = Arc::new(MemoryStore::new());
        let patient = seed_user(store.as_ref(), "pat@example.com", UserRole::Patient).await;
        let other = seed_user(store.as_ref(), "sam@example.com", UserRole::Patient).await;
        let provider = seed_user(store.as_ref(), "doc@example.com", UserRole::Provider).await;
        Fixture {
            service: BookingService::new(store, BookingHours::default()),
            patient,
            other,
            provider,
            now: monday(7, 0),
        }
    }

    fn actor(user: &UserRecord) -> Actor {
        Actor { id: user.id, role: user.role }
    }

    #[tokio::test]
    async fn double_booking_conflicts_until_cancelled() {
        let f = fixture().await;
        let first = f.service.book(f.patient.id, booking(f.provider.id, monday(9, 0)), f.now).await.unwrap();
        assert_eq!(first.reason.as_deref(), Some("checkup"));
        assert_eq!(first.metadata, json!({}));

        let err = f.service.book(f.other.id, booking(f.provider.id, monday(9, 0)), f.now).await.unwrap_err();
        assert_eq!(err, BookingError::SlotTaken);

        f.service.cancel(actor(&f.patient), first.id, f.now).await.unwrap();
        f.service.book(f.other.id, booking(f.provider.id, monday(9, 0)), f.now).await.unwrap();
    }

    #[tokio::test]
    async fn only_providers_can_be_booked() {
        let f = fixture().await;
        let err = f.service.book(f.patient.id, booking(f.other.id, monday(9, 0)), f.now).await.unwrap_err();
        assert_eq!(err, BookingError::NotFound("provider".into()));
    }

    #[tokio::test]
    async fn off_grid_and_past_starts_are_rejected() {
        let f = fixture().await;
        for start in [monday(9, 10), monday(6, 0), monday(17, 0)] {
            let err = f.service.book(f.patient.id, booking(f.provider.id, start), f.now).await.unwrap_err();
            assert!(matches!(err, BookingError::InvalidSlot(_)), "{start}: {err}");
        }
    }

    #[tokio::test]
    async fn availability_excludes_booked_slots() {
        let f = fixture().await;
        let date = f.now.date_naive();
        assert_eq!(f.service.availability(f.provider.id, date, f.now).await.unwrap().len(), 16);
        f.service.book(f.patient.id, booking(f.provider.id, monday(9, 30)), f.now).await.unwrap();
        let free = f.service.availability(f.provider.id, date, f.now).await.unwrap();
        assert_eq!(free.len(), 15);
        assert!(free.iter().all(|s| s.start != monday(9, 30)));
    }

    #[tokio::test]
    async fn visibility_follows_roles() {
        let f = fixture().await;
        let a = f.service.book(f.patient.id, booking(f.provider.id, monday(10, 0)), f.now).await.unwrap();

        assert!(f.service.get(actor(&f.provider), a.id).await.is_ok());
        assert_eq!(
            f.service.get(actor(&f.other), a.id).await.unwrap_err(),
            BookingError::NotFound("appointment".into())
        );
        let admin = Actor { id: Uuid::new_v4(), role: UserRole::Admin };
        assert_eq!(f.service.list(admin, ListQuery::default(), f.now).await.unwrap().len(), 1);
        assert!(f.service.list(actor(&f.other), ListQuery::default(), f.now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_the_provider_completes() {
        let f = fixture().await;
        let a = f.service.book(f.patient.id, booking(f.provider.id, monday(11, 0)), f.now).await.unwrap();
        let complete = AppointmentChanges { status: Some(AppointmentStatus::Completed), ..Default::default() };

        let err = f.service.update(actor(&f.patient), a.id, complete.clone(), f.now).await.unwrap_err();
        assert!(matches!(err, BookingError::Forbidden(_)));
        let done = f.service.update(actor(&f.provider), a.id, complete, f.now).await.unwrap();
        assert_eq!(done.status, AppointmentStatus::Completed);

        let err = f.service.cancel(actor(&f.patient), a.id, f.now).await.unwrap_err();
        assert!(matches!(err, BookingError::Invalid(_)));
    }

    #[tokio::test]
    async fn reschedule_onto_taken_slot_conflicts() {
        let f = fixture().await;
        f.service.book(f.other.id, booking(f.provider.id, monday(14, 0)), f.now).await.unwrap();
        let mine = f.service.book(f.patient.id, booking(f.provider.id, monday(15, 0)), f.now).await.unwrap();

        let err = f.service.reschedule(actor(&f.patient), mine.id, monday(14, 0), f.now).await.unwrap_err();
        assert_eq!(err, BookingError::SlotTaken);
        let moved = f.service.reschedule(actor(&f.patient), mine.id, monday(16, 30), f.now).await.unwrap();
        assert_eq!(moved.end_time, monday(17, 0));
    }

    #[tokio::test]
    async fn agent_backend_is_scoped_to_the_patient() {
        let f = fixture().await;
        let backend = AgentBookingBackend::new(Arc::new(f.service));
        let booked = backend.book(f.patient.id, f.provider.id, monday(12, 0), None, f.now).await.unwrap();
        assert_eq!(booked.provider_name.as_deref(), Some("doc"));

        let err = backend.cancel(f.other.id, booked.id).await.unwrap_err();
        assert_eq!(err, BookingError::NotFound("appointment".into()));

        // The provider cannot use the chat tools to cancel a patient's booking.
        let err = backend.cancel(f.provider.id, booked.id).await.unwrap_err();
        assert_eq!(err, BookingError::NotFound("appointment".into()));

        let mine = backend.list_for_user(f.patient.id, true, f.now).await.unwrap();
        assert_eq!(mine.len(), 1);
    }
}
