use slotwise_types::BookingError;

/// Failures that abort an agent turn.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The LLM endpoint could not be reached or returned an error.
    #[error("llm provider error: {0}")]
    Provider(String),

    /// The model kept requesting tools past the configured round limit.
    #[error("tool loop exceeded {rounds} rounds without a final reply")]
    ToolLoopExhausted { rounds: usize },

    /// The model answered with neither text nor tool calls.
    #[error("llm returned an empty reply")]
    EmptyReply,

    /// Loading or persisting conversation history failed.
    #[error("history store error: {0}")]
    History(String),

    #[error("invalid agent configuration: {0}")]
    Config(String),
}

/// Failures of a single tool invocation.
///
/// These never abort a turn: the agent serialises them into the tool result
/// so the model can explain the problem to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The backend refused the request (slot taken, not found, not allowed).
    #[error("{0}")]
    Rejected(String),

    /// The backend failed for reasons unrelated to the request.
    #[error("booking system unavailable")]
    Backend(String),
}

impl From<BookingError> for ToolError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::Storage(detail) => ToolError::Backend(detail),
            other => ToolError::Rejected(other.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn booking_refusals_become_rejections() {
        assert_eq!(
            ToolError::from(BookingError::SlotTaken),
            ToolError::Rejected("slot already booked".into())
        );
        let backend = ToolError::from(BookingError::Storage("connection reset".into()));
        // Storage details stay out of the message shown to the model.
        assert_eq!(backend.to_string(), "booking system unavailable");
    }
}
