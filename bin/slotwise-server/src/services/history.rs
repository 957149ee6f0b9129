//! Chat persistence for the agent, on top of the message store.

use std::sync::Arc;

use async_trait::async_trait;
use slotwise_agent::{AgentError, HistoryStore, Turn};
use uuid::Uuid;

use crate::entities::{AppStore, ChatMessage, ChatStore};

pub struct StoreHistory {
    store: Arc<dyn AppStore>,
}

impl StoreHistory {
    pub fn new(store: Arc<dyn AppStore>) -> Self {
        Self { store }
    }
}

impl From<ChatMessage> for Turn {
    fn from(m: ChatMessage) -> Self {
        Turn { id: m.id, role: m.role, content: m.content, metadata: m.metadata, created_at: m.created_at }
    }
}

#[async_trait]
impl HistoryStore for StoreHistory {
    async fn load_recent(&self, session_id: Uuid, limit: usize) -> Result<Vec<Turn>, AgentError> {
        let messages = self
            .store
            .recent_messages(session_id, limit)
            .await
            .map_err(|e| AgentError::History(e.to_string()))?;
        Ok(messages.into_iter().map(Turn::from).collect())
    }

    async fn append(&self, session_id: Uuid, turn: &Turn) -> Result<(), AgentError> {
        let message = ChatMessage {
            id: turn.id,
            session_id,
            role: turn.role,
            content: turn.content.clone(),
            metadata: turn.metadata.clone(),
            created_at: turn.created_at,
        };
        self.store
            .append_message(&message)
            .await
            .map_err(|e| AgentError::History(e.to_string()))
    }
}
