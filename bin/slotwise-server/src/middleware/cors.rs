use crate::middleware::rate_limit::RETRY_AFTER_HEADER;
use crate::middleware::trace::X_TRACE_ID;
use crate::state::AppState;
use axum::http::HeaderName;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

pub fn cors_layer(state: Arc<AppState>) -> CorsLayer {
    let exposed = [HeaderName::from_static(X_TRACE_ID), HeaderName::from_static(RETRY_AFTER_HEADER)];
    let base = CorsLayer::new().allow_headers(Any).allow_methods(Any).expose_headers(exposed);

    let origins: Vec<axum::http::HeaderValue> = state
        .config
        .cors_allowed_origins
        .as_deref()
        .map(|list| list.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();

    if origins.is_empty() {
        // Wildcard, suitable for development; set SLOTWISE_CORS_ORIGINS in production.
        base.allow_origin(Any)
    } else {
        base.allow_origin(origins)
    }
}
