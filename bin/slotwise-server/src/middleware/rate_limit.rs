//! Fixed-window request limiter keyed by caller.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::warn;

use crate::error::ServerError;
use crate::middleware::auth::bearer_token;
use crate::state::AppState;

pub const RETRY_AFTER_HEADER: &str = "retry-after";

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Allows `limit` requests per key in each window. A limit of 0 disables it.
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<String, Window>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window, windows: DashMap::new() }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, Duration::from_secs(60))
    }

    /// Count one request for `key`. `Err` carries the seconds until the
    /// window resets.
    pub fn check(&self, key: &str) -> Result<(), u64> {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> Result<(), u64> {
        if self.limit == 0 {
            return Ok(());
        }
        let mut window = self
            .windows
            .entry(key.to_owned())
            .or_insert(Window { started: now, count: 0 });
        let elapsed = now.saturating_duration_since(window.started);
        if elapsed >= self.window {
            *window = Window { started: now, count: 0 };
        }
        if window.count < self.limit {
            window.count += 1;
            return Ok(());
        }
        let remaining = self.window.saturating_sub(now.saturating_duration_since(window.started));
        let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
        Err(secs.max(1))
    }

    /// Drop windows that have already expired. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }
}

/// Rate-limit key: the authenticated user when the bearer token verifies,
/// otherwise the client address.
pub fn caller_key(state: &AppState, req: &Request) -> String {
    if let Some(claims) = bearer_token(req.headers()).and_then(|t| state.jwt.verify(t).ok()) {
        return format!("user:{}", claims.sub);
    }
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .or_else(|| forwarded_for(req.headers()))
        .unwrap_or_else(|| "unknown".to_owned());
    format!("ip:{ip}")
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn enforce(limiter: &RateLimiter, scope: &'static str, state: &AppState, req: &Request) -> Result<(), ServerError> {
    let key = caller_key(state, req);
    limiter.check(&key).map_err(|retry_after_secs| {
        warn!(%key, scope, retry_after_secs, "rate limit exceeded");
        ServerError::RateLimited { retry_after_secs }
    })
}

pub async fn limit_api(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Result<Response, ServerError> {
    enforce(&state.api_limiter, "api", &state, &req)?;
    Ok(next.run(req).await)
}

pub async fn limit_auth(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Result<Response, ServerError> {
    enforce(&state.auth_limiter, "auth", &state, &req)?;
    Ok(next.run(req).await)
}
