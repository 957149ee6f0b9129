//! The tool-calling loop.
//!
//! One turn: load recent history (cache first), persist the user message,
//! then alternate model calls and tool dispatch until the model answers in
//! text or the round limit is hit. Turns of the same session are serialised.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use slotwise_types::{BookingHours, MessageRole};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::ConversationCache;
use crate::error::AgentError;
use crate::history::{HistoryStore, Turn};
use crate::llm::{ConversationMessage, LlmClient, LlmRequest, LlmUsage};
use crate::prompt::system_prompt;
use crate::tools::{ToolContext, ToolRegistry};

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Model calls allowed per turn before giving up.
    pub max_tool_rounds: usize,
    /// Past turns sent to the model with each request.
    pub history_turns: usize,
    pub hours: BookingHours,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { max_tool_rounds: 5, history_turns: 20, hours: BookingHours::default() }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TurnContext {
    pub session_id: Uuid,
    pub user_id: Uuid,
    /// Reference time for the prompt and slot checks. Turns are stamped
    /// from the wall clock once the session lock is held.
    pub now: DateTime<Utc>,
}

/// A tool call made during a turn, as recorded in the reply's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub call_id: String,
    pub name: String,
    pub arguments: Value,
    pub result: Value,
    pub ok: bool,
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub user_turn: Turn,
    pub reply: Turn,
    pub tool_invocations: Vec<ToolInvocation>,
    pub rounds: usize,
    pub usage: LlmUsage,
}

/// One async mutex per session with a turn in flight.
#[derive(Default)]
struct SessionLocks {
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    fn acquire(&self, session_id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let Ok(mut locks) = self.locks.lock() else {
            return Arc::new(tokio::sync::Mutex::new(()));
        };
        // Drop locks nobody is holding or waiting on.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(session_id).or_default().clone()
    }

    fn remove(&self, session_id: Uuid) {
        if let Ok(mut locks) = self.locks.lock() {
            locks.remove(&session_id);
        }
    }
}

pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    history: Arc<dyn HistoryStore>,
    cache: Arc<ConversationCache>,
    locks: SessionLocks,
    config: AgentConfig,
}

impl Agent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        history: Arc<dyn HistoryStore>,
        cache: Arc<ConversationCache>,
        config: AgentConfig,
    ) -> Self {
        Self { llm, tools, history, cache, locks: SessionLocks::default(), config }
    }

    pub fn llm(&self) -> &dyn LlmClient {
        self.llm.as_ref()
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn cache(&self) -> &ConversationCache {
        &self.cache
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Drop cached state for a deleted session.
    pub fn forget_session(&self, session_id: Uuid) {
        self.cache.invalidate(session_id);
        self.locks.remove(session_id);
    }

    /// Run one user turn to completion.
    ///
    /// The user message is persisted before the model is called, so it
    /// survives a provider failure. The assistant reply is persisted only on
    /// success.
    pub async fn run_turn(&self, ctx: TurnContext, message: &str) -> Result<AgentOutcome, AgentError> {
        let lock = self.locks.acquire(ctx.session_id);
        let _guard = lock.lock().await;
        let started = Instant::now();

        let (history, latest) = self.recent_history(ctx.session_id).await?;

        // Stamped under the lock so a queued turn sorts after the one it waited on.
        let turn_start = turn_time(Utc::now(), latest);
        let user_turn = Turn::new(MessageRole::User, message, turn_start);
        self.history.append(ctx.session_id, &user_turn).await?;
        self.cache.push(ctx.session_id, user_turn.clone());

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ConversationMessage::system(system_prompt(ctx.now, &self.config.hours)));
        messages.extend(history.iter().map(Turn::to_message));
        messages.push(user_turn.to_message());

        let tools = self.tools.schemas();
        let tool_ctx = ToolContext { user_id: ctx.user_id, session_id: ctx.session_id, now: ctx.now };
        let mut invocations: Vec<ToolInvocation> = Vec::new();
        let mut usage = LlmUsage::default();

        for round in 1..=self.config.max_tool_rounds {
            let reply = self
                .llm
                .chat(LlmRequest { messages: messages.clone(), tools: tools.clone() })
                .await?;
            if let Some(u) = reply.usage {
                usage.add(u);
            }

            if reply.tool_calls.is_empty() {
                let text = reply
                    .content
                    .filter(|c| !c.trim().is_empty())
                    .ok_or(AgentError::EmptyReply)?;
                let metadata = json!({
                    "tool_calls": invocations,
                    "rounds": round,
                    "model": self.llm.model(),
                    "usage": usage,
                });
                let reply_turn = Turn::new(MessageRole::Assistant, text, reply_time(turn_start, started))
                    .with_metadata(metadata);
                self.history.append(ctx.session_id, &reply_turn).await?;
                self.cache.push(ctx.session_id, reply_turn.clone());

                info!(
                    session_id = %ctx.session_id,
                    rounds = round,
                    tool_calls = invocations.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "agent turn completed"
                );
                return Ok(AgentOutcome {
                    user_turn,
                    reply: reply_turn,
                    tool_invocations: invocations,
                    rounds: round,
                    usage,
                });
            }

            debug!(session_id = %ctx.session_id, round, calls = reply.tool_calls.len(), "model requested tools");
            messages.push(ConversationMessage::assistant_tool_calls(reply.content, reply.tool_calls.clone()));
            for call in reply.tool_calls {
                let outcome = self.tools.dispatch(&tool_ctx, &call).await;
                messages.push(ConversationMessage::tool_result(call.id.clone(), outcome.value.to_string()));
                invocations.push(ToolInvocation {
                    call_id: call.id,
                    name: call.name,
                    arguments: call.arguments,
                    result: outcome.value,
                    ok: outcome.ok,
                });
            }
        }

        warn!(session_id = %ctx.session_id, rounds = self.config.max_tool_rounds, "tool loop exhausted");
        Err(AgentError::ToolLoopExhausted { rounds: self.config.max_tool_rounds })
    }

    /// The newest `history_turns` turns, plus the timestamp of the latest
    /// stored turn even when the window is empty.
    async fn recent_history(&self, session_id: Uuid) -> Result<(Vec<Turn>, Option<DateTime<Utc>>), AgentError> {
        let limit = self.config.history_turns;
        let mut turns = match self.cache.get(session_id) {
            Some(turns) => turns,
            None => {
                let turns = self.history.load_recent(session_id, limit.max(self.cache.max_turns())).await?;
                self.cache.put_all(session_id, turns.clone());
                turns
            }
        };
        let latest = turns.last().map(|t| t.created_at);
        let skip = turns.len().saturating_sub(limit);
        turns.drain(..skip);
        Ok((turns, latest))
    }
}

/// Timestamp for the user turn: the wall clock, but at least a microsecond
/// (the database's resolution) after the latest stored turn.
fn turn_time(now: DateTime<Utc>, latest: Option<DateTime<Utc>>) -> DateTime<Utc> {
    match latest {
        Some(latest) => now.max(latest + TimeDelta::microseconds(1)),
        None => now,
    }
}

/// Timestamp for the assistant turn: strictly after the user turn.
fn reply_time(turn_start: DateTime<Utc>, started: Instant) -> DateTime<Utc> {
    let elapsed = TimeDelta::from_std(started.elapsed()).unwrap_or_default();
    turn_start + elapsed.max(TimeDelta::microseconds(1))
}
