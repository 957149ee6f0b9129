//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** Internal errors (Agent, Database, Internal) are logged
//! with full detail but only a generic message is returned to the caller so
//! that SQL, provider responses or other implementation details never leak.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use slotwise_agent::AgentError;
use slotwise_types::BookingError;
use thiserror::Error;
use tracing::error;

use crate::entities::{constraints, StoreError};

/// All errors that can occur in the slotwise-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller referenced a resource that does not exist (or is not theirs).
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request body failed field validation.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The request clashes with existing state (taken slot, duplicate email).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("rate limit exceeded")]
    RateLimited { retry_after_secs: u64 },

    /// The LLM provider or the agent loop failed.
    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    /// Propagated from the store.
    #[error("database error: {0}")]
    Database(StoreError),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Validation(m) => (StatusCode::UNPROCESSABLE_ENTITY, m.clone()),
            ServerError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            ServerError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            ServerError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
            ServerError::RateLimited { retry_after_secs } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({ "error": "too many requests", "retry_after": retry_after_secs })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
                return response;
            }

            // Internal errors: log the full detail, return a generic message.
            ServerError::Agent(e) => {
                error!(error = %e, "agent error");
                let message = match e {
                    AgentError::ToolLoopExhausted { .. } => "the assistant could not finish this request",
                    _ => "the assistant is temporarily unavailable",
                };
                (StatusCode::BAD_GATEWAY, message.to_owned())
            }
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(constraint) if constraint == constraints::USER_EMAIL => {
                ServerError::Conflict("email already registered".into())
            }
            StoreError::Conflict(constraint) if constraint == constraints::PROVIDER_SLOT => {
                ServerError::Conflict(BookingError::SlotTaken.to_string())
            }
            StoreError::Conflict(constraint) => ServerError::Conflict(format!("conflicts with existing data ({constraint})")),
            StoreError::NotFound(what) => ServerError::NotFound(format!("{what} not found")),
            StoreError::InvalidReference(detail) => ServerError::BadRequest(format!("unknown reference: {detail}")),
            other => ServerError::Database(other),
        }
    }
}

impl From<sqlx::Error> for ServerError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::from(e).into()
    }
}

impl From<BookingError> for ServerError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::SlotTaken => ServerError::Conflict(e.to_string()),
            BookingError::NotFound(_) => ServerError::NotFound(e.to_string()),
            BookingError::InvalidSlot(_) | BookingError::Invalid(_) => ServerError::BadRequest(e.to_string()),
            BookingError::Forbidden(_) => ServerError::Forbidden(e.to_string()),
            BookingError::Storage(detail) => ServerError::Internal(detail),
        }
    }
}

impl From<validator::ValidationErrors> for ServerError {
    fn from(e: validator::ValidationErrors) -> Self {
        ServerError::Validation(e.to_string())
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        // Log the full error chain before discarding it so that diagnostic
        // detail is preserved in the server logs even though clients only see
        // a generic message.
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::Value;

    async fn body_of(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn client_errors_expose_their_message() {
        let response = ServerError::Conflict("slot already booked".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_of(response).await["error"], "slot already booked");
    }

    #[tokio::test]
    async fn internal_errors_are_masked() {
        let response = ServerError::Database(StoreError::Corrupt("role = 'x'".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await["error"], "internal server error");

        let response = ServerError::Agent(AgentError::Provider("HTTP 401: bad key sk-123".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_of(response).await;
        assert!(!body["error"].as_str().unwrap().contains("sk-123"));
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let response = ServerError::RateLimited { retry_after_secs: 17 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "17");
    }

    #[test]
    fn store_conflicts_map_to_domain_messages() {
        let err = ServerError::from(StoreError::Conflict(constraints::PROVIDER_SLOT.into()));
        assert!(matches!(err, ServerError::Conflict(m) if m == "slot already booked"));
        let err = ServerError::from(StoreError::Conflict(constraints::USER_EMAIL.into()));
        assert!(matches!(err, ServerError::Conflict(m) if m == "email already registered"));
        let err = ServerError::from(StoreError::NotFound("appointment"));
        assert!(matches!(err, ServerError::NotFound(m) if m == "appointment not found"));
    }

    #[test]
    fn booking_errors_map_to_statuses() {
        assert!(matches!(ServerError::from(BookingError::SlotTaken), ServerError::Conflict(_)));
        assert!(matches!(
            ServerError::from(BookingError::InvalidSlot("past".into())),
            ServerError::BadRequest(_)
        ));
        assert!(matches!(
            ServerError::from(BookingError::Forbidden("not yours".into())),
            ServerError::Forbidden(_)
        ));
    }
}
