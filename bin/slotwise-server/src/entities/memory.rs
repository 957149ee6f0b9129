//! In-process store for tests and database-less local runs.
//!
//! Mirrors the Postgres schema rules that the rest of the server relies on:
//! case-insensitive unique emails, one live booking per provider slot,
//! foreign keys, and cascading session deletes.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slotwise_types::UserRole;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    constraints, AppStore, AppointmentFilter, AppointmentRecord, AppointmentStore, ChatMessage, ChatSession, ChatStore,
    InteractionLog, InteractionStore, SessionStore, StoreError, UserRecord, UserStore,
};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, UserRecord>,
    appointments: HashMap<Uuid, AppointmentRecord>,
    sessions: HashMap<Uuid, ChatSession>,
    // Insertion order doubles as the tie-breaker for equal timestamps.
    messages: Vec<ChatMessage>,
    interactions: Vec<InteractionLog>,
}

impl Tables {
    fn slot_taken(&self, candidate: &AppointmentRecord) -> bool {
        candidate.status.holds_slot()
            && self.appointments.values().any(|a| {
                a.id != candidate.id
                    && a.provider_id == candidate.provider_id
                    && a.start_time == candidate.start_time
                    && a.status.holds_slot()
            })
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::Conflict(constraints::USER_EMAIL.to_owned()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn list_users_by_role(&self, role: UserRole) -> Result<Vec<UserRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut users: Vec<UserRecord> = tables.users.values().filter(|u| u.role == role).cloned().collect();
        users.sort_by(|a, b| a.full_name.cmp(&b.full_name).then(a.id.cmp(&b.id)));
        Ok(users)
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn insert_appointment(&self, appointment: &AppointmentRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        for user in [appointment.user_id, appointment.provider_id] {
            if !tables.users.contains_key(&user) {
                return Err(StoreError::InvalidReference(format!("user {user}")));
            }
        }
        if tables.slot_taken(appointment) {
            return Err(StoreError::Conflict(constraints::PROVIDER_SLOT.to_owned()));
        }
        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn get_appointment(&self, id: Uuid) -> Result<Option<AppointmentRecord>, StoreError> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn list_appointments(&self, filter: &AppointmentFilter) -> Result<Vec<AppointmentRecord>, StoreError> {
        let tables = self.tables.read().await;
        let mut found: Vec<AppointmentRecord> =
            tables.appointments.values().filter(|a| filter.matches(a)).cloned().collect();
        found.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn update_appointment(&self, appointment: &AppointmentRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.appointments.contains_key(&appointment.id) {
            return Err(StoreError::NotFound("appointment"));
        }
        if tables.slot_taken(appointment) {
            return Err(StoreError::Conflict(constraints::PROVIDER_SLOT.to_owned()));
        }
        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn booked_starts(
        &self,
        provider_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, StoreError> {
        let tables = self.tables.read().await;
        let mut starts: Vec<DateTime<Utc>> = tables
            .appointments
            .values()
            .filter(|a| {
                a.provider_id == provider_id && a.status.holds_slot() && a.start_time >= from && a.start_time < to
            })
            .map(|a| a.start_time)
            .collect();
        starts.sort();
        Ok(starts)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, session: &ChatSession) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&session.user_id) {
            return Err(StoreError::InvalidReference(format!("user {}", session.user_id)));
        }
        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<ChatSession>, StoreError> {
        Ok(self.tables.read().await.sessions.get(&id).cloned())
    }

    async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<ChatSession>, StoreError> {
        let tables = self.tables.read().await;
        let mut sessions: Vec<ChatSession> =
            tables.sessions.values().filter(|s| s.user_id == user_id).cloned().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(sessions)
    }

    async fn touch_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        if let Some(session) = self.tables.write().await.sessions.get_mut(&id) {
            session.updated_at = at;
        }
        Ok(())
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.sessions.remove(&id).is_none() {
            return Ok(false);
        }
        tables.messages.retain(|m| m.session_id != id);
        Ok(true)
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn append_message(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.sessions.contains_key(&message.session_id) {
            return Err(StoreError::InvalidReference(format!("chat session {}", message.session_id)));
        }
        tables.messages.push(message.clone());
        Ok(())
    }

    async fn list_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessage>, StoreError> {
        let tables = self.tables.read().await;
        let mut messages: Vec<ChatMessage> =
            tables.messages.iter().filter(|m| m.session_id == session_id).cloned().collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn recent_messages(&self, session_id: Uuid, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        let mut messages = self.list_messages(session_id).await?;
        let skip = messages.len().saturating_sub(limit);
        messages.drain(..skip);
        Ok(messages)
    }
}

#[async_trait]
impl InteractionStore for MemoryStore {
    async fn log_interaction(&self, log: &InteractionLog) -> Result<(), StoreError> {
        self.tables.write().await.interactions.push(log.clone());
        Ok(())
    }

    async fn list_interactions(&self, user_id: Option<Uuid>, limit: usize) -> Result<Vec<InteractionLog>, StoreError> {
        let tables = self.tables.read().await;
        let mut logs: Vec<InteractionLog> = tables
            .interactions
            .iter()
            .filter(|l| user_id.is_none() || l.user_id == user_id)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        logs.truncate(limit);
        Ok(logs)
    }
}

#[async_trait]
impl AppStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
