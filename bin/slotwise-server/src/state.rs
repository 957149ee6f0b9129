//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use slotwise_agent::{register_booking_tools, Agent, ConversationCache, LlmClient, ToolRegistry};

use crate::auth::{JwtKeys, RevokedTokens};
use crate::config::Config;
use crate::entities::AppStore;
use crate::middleware::rate_limit::RateLimiter;
use crate::services::{AgentBookingBackend, BookingService, ChatService, StoreHistory};

/// State shared across all HTTP handlers.
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    pub store: Arc<dyn AppStore>,
    pub jwt: JwtKeys,
    /// Logged-out token ids, until they expire.
    pub revoked: RevokedTokens,
    pub api_limiter: RateLimiter,
    pub auth_limiter: RateLimiter,
    pub booking: Arc<BookingService>,
    pub chat: ChatService,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &self.store.backend())
            .field("llm", &self.chat.agent().llm().name())
            .field("revoked", &self.revoked.len())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wire the booking service, the agent and its tools on top of `store`.
    pub fn new(config: Config, store: Arc<dyn AppStore>, llm: Arc<dyn LlmClient>) -> anyhow::Result<Self> {
        let agent_config = config.agent_config()?;
        let booking = Arc::new(BookingService::new(store.clone(), agent_config.hours));

        let mut tools = ToolRegistry::new();
        register_booking_tools(&mut tools, Arc::new(AgentBookingBackend::new(booking.clone())));

        let cache = Arc::new(ConversationCache::new(agent_config.history_turns, config.cache_max_sessions));
        let agent = Agent::new(
            llm,
            Arc::new(tools),
            Arc::new(StoreHistory::new(store.clone())),
            cache,
            agent_config,
        );

        Ok(Self {
            jwt: JwtKeys::new(config.jwt_secret.as_bytes(), config.jwt_ttl_secs),
            revoked: RevokedTokens::new(),
            api_limiter: RateLimiter::per_minute(config.rate_limit_per_minute),
            auth_limiter: RateLimiter::per_minute(config.auth_rate_limit_per_minute),
            chat: ChatService::new(store.clone(), Arc::new(agent)),
            booking,
            store,
            config: Arc::new(config),
        })
    }
}
