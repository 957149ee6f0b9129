//! Application services sitting between the routes and the store.

pub mod booking;
pub mod chat;
pub mod history;

pub use booking::{Actor, AgentBookingBackend, AppointmentChanges, BookingService, ListQuery, NewBooking};
pub use chat::ChatService;
pub use history::StoreHistory;
