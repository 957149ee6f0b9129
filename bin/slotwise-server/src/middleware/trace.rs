use crate::state::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

/// Bodies under this prefix carry passwords and tokens.
const SENSITIVE_PREFIX: &str = "/api/auth";
const MAX_LOGGED_BODY: usize = 1024;

pub async fn trace_middleware(State(_state): State<Arc<AppState>>, req: Request<Body>, next: Next) -> Response {
    let start_time = Instant::now();

    // Take the caller's trace id or mint one.
    let trace_id = req
        .headers()
        .get(X_TRACE_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4);
    let trace_header = HeaderValue::from_str(&trace_id.to_string()).ok();

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let log_bodies = !path.starts_with(SENSITIVE_PREFIX);

    let span = info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
    );

    async move {
        info!("→ request started");
        let mut req = if log_bodies {
            let (parts, body) = req.into_parts();
            let bytes = buffer_and_log("request", &parts.headers, body).await;
            Request::from_parts(parts, Body::from(bytes))
        } else {
            req
        };
        if let Some(value) = &trace_header {
            req.headers_mut().insert(X_TRACE_ID, value.clone());
        }

        let response = next.run(req).await;

        let mut response = if log_bodies {
            let (parts, body) = response.into_parts();
            let bytes = buffer_and_log("response", &parts.headers, body).await;
            Response::from_parts(parts, Body::from(bytes))
        } else {
            response
        };
        if let Some(value) = trace_header {
            response.headers_mut().insert(X_TRACE_ID, value);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            "← response finished"
        );
        response
    }
    .instrument(span)
    .await
}

/// Collect a body, logging it when it is small JSON.
async fn buffer_and_log(direction: &str, headers: &header::HeaderMap, body: Body) -> Bytes {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let is_json = content_type.contains("application/json");

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return Bytes::new(),
    };

    if is_json && bytes.len() < MAX_LOGGED_BODY {
        if let Ok(text) = std::str::from_utf8(&bytes) {
            info!("{direction} body: {text}");
        }
    } else if !bytes.is_empty() {
        info!("{direction} body: [skipped: type={content_type}, size={}]", bytes.len());
    }

    bytes
}
