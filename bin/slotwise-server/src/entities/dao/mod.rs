//! Row types shared by every store implementation.

mod appointment;
mod chat;
mod interaction;
mod session;
mod user;

pub use appointment::{AppointmentFilter, AppointmentRecord};
pub use chat::ChatMessage;
pub use interaction::InteractionLog;
pub use session::ChatSession;
pub use user::UserRecord;
