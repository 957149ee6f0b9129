//! Health endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::warn;
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

/// Register health-check routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Liveness plus a database ping.
///
/// Returns `{"status": "ok", ...}` with HTTP 200, or `"degraded"` with 503
/// when the store does not answer.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server and database are healthy", body = Value),
        (status = 503, description = "Database unreachable", body = Value)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let (status, code, database) = match state.store.ping().await {
        Ok(()) => ("ok", StatusCode::OK, "up"),
        Err(e) => {
            warn!(error = %e, "database ping failed");
            ("degraded", StatusCode::SERVICE_UNAVAILABLE, "down")
        }
    };
    (
        code,
        Json(json!({
            "status":   status,
            "version":  env!("CARGO_PKG_VERSION"),
            "database": { "backend": state.store.backend(), "status": database },
        })),
    )
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::entities::PgStore;
    use crate::state::test::memory_state;
    use slotwise_agent::llm::DummyProvider;

    #[tokio::test]
    async fn health_response_has_ok_status() {
        let state = memory_state(Config::default(), None);
        let (code, Json(body)) = get_health(State(state)).await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"]["backend"], "memory");
    }

    #[tokio::test]
    async fn unreachable_database_degrades_health() {
        let store = Arc::new(PgStore::unreachable());
        let state = Arc::new(AppState::new(Config::default(), store, Arc::new(DummyProvider)).unwrap());
        let (code, Json(body)) = get_health(State(state)).await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["database"]["backend"], "postgres");
        assert_eq!(body["database"]["status"], "down");
    }

    #[tokio::test]
    async fn health_response_has_version() {
        let state = memory_state(Config::default(), None);
        let (_, Json(body)) = get_health(State(state)).await;
        assert!(!body["version"].as_str().unwrap_or("").is_empty());
    }
}
