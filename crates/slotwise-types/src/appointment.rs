use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Lifecycle of an appointment row.
///
/// Only `Scheduled` and `Completed` rows hold their slot; a cancelled row is
/// excluded from the `(provider_id, start_time)` uniqueness index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn holds_slot(self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

/// Why a booking operation was refused.
///
/// Shared by the REST handlers and the agent's booking tools so both surfaces
/// report the same refusal reasons.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    /// Another non-cancelled appointment already occupies the slot.
    #[error("slot already booked")]
    SlotTaken,

    #[error("{0} not found")]
    NotFound(String),

    /// The requested start time is not a bookable slot.
    #[error("invalid slot: {0}")]
    InvalidSlot(String),

    #[error("not permitted: {0}")]
    Forbidden(String),

    #[error("invalid request: {0}")]
    Invalid(String),

    /// The store failed; the message is for logs, not for clients.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl BookingError {
    /// `true` when the refusal is the caller's fault rather than ours.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, BookingError::Storage(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cancelled_releases_slot() {
        assert!(AppointmentStatus::Scheduled.holds_slot());
        assert!(AppointmentStatus::Completed.holds_slot());
        assert!(!AppointmentStatus::Cancelled.holds_slot());
    }

    #[test]
    fn storage_errors_are_not_client_errors() {
        assert!(BookingError::SlotTaken.is_client_error());
        assert!(!BookingError::Storage("pool timed out".into()).is_client_error());
        assert_eq!(
            BookingError::NotFound("appointment".into()).to_string(),
            "appointment not found"
        );
    }
}
