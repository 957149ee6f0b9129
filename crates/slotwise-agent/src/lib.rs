//! Tool-calling conversation agent for appointment booking.
//!
//! The crate is storage- and transport-agnostic: the host implements
//! [`HistoryStore`] for chat persistence and [`tools::BookingBackend`] for the
//! calendar, then drives turns through [`Agent::run_turn`].

pub mod agent;
pub mod cache;
pub mod error;
pub mod history;
pub mod llm;
pub mod prompt;
pub mod tools;

pub use agent::{Agent, AgentConfig, AgentOutcome, ToolInvocation, TurnContext};
pub use cache::{CacheStats, ConversationCache};
pub use error::{AgentError, ToolError};
pub use history::{HistoryStore, Turn};
pub use llm::{build_provider, LlmClient, LlmSettings, LlmUsage, ProviderKind};
pub use tools::{register_booking_tools, AppointmentView, BookingBackend, ProviderView, ToolRegistry};
