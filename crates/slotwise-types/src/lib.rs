//! Domain types shared by the slotwise server and the booking agent.
//!
//! Nothing in this crate touches the network or the database; it only
//! describes roles, appointment states, booking errors and the slot grid.

pub mod appointment;
pub mod role;
pub mod slot;

pub use appointment::{AppointmentStatus, BookingError};
pub use role::{MessageRole, UserRole};
pub use slot::{BookingHours, HoursError, TimeSlot};
