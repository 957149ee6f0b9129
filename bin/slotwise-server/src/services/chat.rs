//! Chat sessions and agent turns, with an interaction log per turn.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use slotwise_agent::{Agent, AgentOutcome, TurnContext};
use tracing::warn;
use uuid::Uuid;

use crate::entities::{AppStore, ChatMessage, ChatSession, ChatStore, InteractionLog, InteractionStore, SessionStore};
use crate::error::ServerError;

/// Title given to sessions created without one.
pub const DEFAULT_SESSION_TITLE: &str = "New conversation";

pub struct ChatService {
    store: Arc<dyn AppStore>,
    agent: Arc<Agent>,
}

impl ChatService {
    pub fn new(store: Arc<dyn AppStore>, agent: Arc<Agent>) -> Self {
        Self { store, agent }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub async fn create_session(&self, user_id: Uuid, title: Option<String>) -> Result<ChatSession, ServerError> {
        let now = Utc::now();
        let title = title
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_SESSION_TITLE.to_owned());
        let session = ChatSession { id: Uuid::new_v4(), user_id, title, metadata: json!({}), created_at: now, updated_at: now };
        self.store.create_session(&session).await?;
        Ok(session)
    }

    /// The session, if it exists and belongs to `user_id`.
    pub async fn session_for(&self, user_id: Uuid, session_id: Uuid) -> Result<ChatSession, ServerError> {
        match self.store.get_session(session_id).await? {
            Some(session) if session.user_id == user_id => Ok(session),
            _ => Err(ServerError::NotFound("chat session not found".into())),
        }
    }

    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<ChatSession>, ServerError> {
        Ok(self.store.list_sessions(user_id).await?)
    }

    pub async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> Result<(), ServerError> {
        self.session_for(user_id, session_id).await?;
        self.store.delete_session(session_id).await?;
        self.agent.forget_session(session_id);
        Ok(())
    }

    pub async fn messages(&self, user_id: Uuid, session_id: Uuid) -> Result<Vec<ChatMessage>, ServerError> {
        self.session_for(user_id, session_id).await?;
        Ok(self.store.list_messages(session_id).await?)
    }

    /// Run one agent turn for `user_id` in `session_id`.
    ///
    /// Failed turns are logged too; the user message stays persisted either way.
    pub async fn process(&self, user_id: Uuid, session_id: Uuid, message: &str) -> Result<AgentOutcome, ServerError> {
        self.session_for(user_id, session_id).await?;
        let now = Utc::now();
        let started = Instant::now();
        let result = self.agent.run_turn(TurnContext { session_id, user_id, now }, message).await;
        let latency_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let response = match &result {
            Ok(outcome) => json!({
                "reply": outcome.reply.content,
                "tool_calls": outcome.tool_invocations,
                "rounds": outcome.rounds,
                "usage": outcome.usage,
                "model": self.agent.llm().model(),
            }),
            Err(e) => json!({ "error": e.to_string() }),
        };
        self.record(InteractionLog {
            id: Uuid::new_v4(),
            session_id: Some(session_id),
            user_id: Some(user_id),
            kind: "chat_turn".into(),
            request: json!({ "message": message }),
            response,
            latency_ms,
            created_at: now,
        })
        .await;

        if let Err(e) = self.store.touch_session(session_id, Utc::now()).await {
            warn!(error = %e, %session_id, "failed to bump session activity");
        }
        Ok(result?)
    }

    /// Persist an interaction log row. Failures are logged and swallowed so
    /// the audit trail never breaks a chat turn.
    async fn record(&self, log: InteractionLog) {
        if let Err(e) = self.store.log_interaction(&log).await {
            warn!(error = %e, kind = %log.kind, "failed to write interaction log");
        }
    }

    pub async fn interactions(&self, user_id: Option<Uuid>, limit: usize) -> Result<Vec<InteractionLog>, ServerError> {
        Ok(self.store.list_interactions(user_id, limit).await?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::services::booking::test::seed_user;
    use crate::state::test::memory_state;
    use std::time::Duration;

    use async_trait::async_trait;
    use slotwise_agent::llm::{LlmReply, LlmRequest};
    use slotwise_agent::{AgentError, LlmClient};
    use slotwise_types::{MessageRole, UserRole};

    struct DownLlm;

    #[async_trait]
    impl LlmClient for DownLlm {
        fn name(&self) -> &str {
            "down"
        }

        fn model(&self) -> &str {
            "none"
        }

        async fn chat(&self, _request: LlmRequest) -> Result<LlmReply, AgentError> {
            Err(AgentError::Provider("HTTP 503".into()))
        }
    }

    /// Answers after a delay, echoing the latest user message.
    struct SlowEcho;

    #[async_trait]
    impl LlmClient for SlowEcho {
        fn name(&self) -> &str {
            "slow"
        }

        fn model(&self) -> &str {
            "slow-echo"
        }

        async fn chat(&self, request: LlmRequest) -> Result<LlmReply, AgentError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let last = request.messages.last().and_then(|m| m.content.clone()).unwrap_or_default();
            Ok(LlmReply { content: Some(format!("re: {last}")), tool_calls: Vec::new(), usage: None })
        }
    }

    #[tokio::test]
    async fn successful_turn_is_logged() {
        let state = memory_state(Config::default(), None);
        let user = seed_user(state.store.as_ref(), "ada@example.com", UserRole::Patient).await;
        let session = state.chat.create_session(user.id, Some("  ".into())).await.unwrap();
        assert_eq!(session.title, DEFAULT_SESSION_TITLE);

        let outcome = state.chat.process(user.id, session.id, "hello").await.unwrap();
        assert_eq!(outcome.reply.content, "[echo] hello");

        let logs = state.chat.interactions(Some(user.id), 10).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].response["reply"], "[echo] hello");
        assert_eq!(logs[0].response["model"], "echo");
    }

    #[tokio::test]
    async fn failed_turn_keeps_user_message_and_logs_error() {
        let state = memory_state(Config::default(), Some(Arc::new(DownLlm)));
        let user = seed_user(state.store.as_ref(), "ada@example.com", UserRole::Patient).await;
        let session = state.chat.create_session(user.id, None).await.unwrap();

        let err = state.chat.process(user.id, session.id, "book me in").await.unwrap_err();
        assert!(matches!(err, ServerError::Agent(AgentError::Provider(_))));

        let messages = state.chat.messages(user.id, session.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);

        let logs = state.chat.interactions(None, 10).await.unwrap();
        assert!(logs[0].response["error"].as_str().unwrap().contains("HTTP 503"));
    }

    #[tokio::test]
    async fn concurrent_turns_are_stored_in_order() {
        let state = memory_state(Config::default(), Some(Arc::new(SlowEcho)));
        let user = seed_user(state.store.as_ref(), "ada@example.com", UserRole::Patient).await;
        let session = state.chat.create_session(user.id, None).await.unwrap();

        let (first, second) = tokio::join!(state.chat.process(user.id, session.id, "one"), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            state.chat.process(user.id, session.id, "two").await
        });
        first.unwrap();
        second.unwrap();

        let messages = state.chat.messages(user.id, session.id).await.unwrap();
        let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["one", "re: one", "two", "re: two"]);
    }

    #[tokio::test]
    async fn other_users_sessions_are_not_found() {
        let state = memory_state(Config::default(), None);
        let owner = seed_user(state.store.as_ref(), "ada@example.com", UserRole::Patient).await;
        let other = seed_user(state.store.as_ref(), "eve@example.com", UserRole::Patient).await;
        let session = state.chat.create_session(owner.id, None).await.unwrap();

        assert!(matches!(
            state.chat.process(other.id, session.id, "hi").await,
            Err(ServerError::NotFound(_))
        ));
        assert!(state.chat.delete_session(other.id, session.id).await.is_err());
        state.chat.delete_session(owner.id, session.id).await.unwrap();
        assert!(state.chat.list_sessions(owner.id).await.unwrap().is_empty());
    }
}
