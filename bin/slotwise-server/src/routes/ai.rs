//! Chat-processing service endpoints.
//!
//! `/ai/chat/process` is what a separate UI gateway calls with a service
//! token; end users may call it with their own JWT. `/ai/health` is open.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use utoipa::OpenApi;
use validator::Validate;

use crate::error::ServerError;
use crate::middleware::auth::require_service_token;
use crate::middleware::AuthUser;
use crate::schemas::ai::{AiHealthResponse, CacheStatsResponse, ProcessChatRequest, ProcessChatResponse};
use crate::schemas::api::chatbot::ToolCallResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(process_chat, ai_health),
    components(schemas(ProcessChatRequest, ProcessChatResponse, AiHealthResponse, CacheStatsResponse))
)]
pub struct AiApi;

/// Routes nested under `/ai`.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let guarded = Router::new()
        .route("/chat/process", post(process_chat))
        .route_layer(middleware::from_fn_with_state(state, require_service_token));
    Router::new().route("/health", get(ai_health)).merge(guarded)
}

/// Run one agent turn for a user's session.
#[utoipa::path(
    post,
    path = "/ai/chat/process",
    tag = "ai",
    request_body = ProcessChatRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The assistant's reply", body = ProcessChatResponse),
        (status = 401, description = "Missing service token or JWT"),
        (status = 403, description = "JWT caller acting for another user"),
        (status = 404, description = "Session not found for that user"),
        (status = 502, description = "The language model failed"),
    )
)]
pub async fn process_chat(
    State(state): State<Arc<AppState>>,
    caller: Option<AuthUser>,
    Json(req): Json<ProcessChatRequest>,
) -> Result<Json<ProcessChatResponse>, ServerError> {
    req.validate()?;
    if let Some(caller) = caller {
        if caller.id != req.user_id && !caller.role.is_admin() {
            return Err(ServerError::Forbidden("cannot act for another user".into()));
        }
    }
    let outcome = state.chat.process(req.user_id, req.session_id, &req.message).await?;
    Ok(Json(ProcessChatResponse {
        reply: outcome.reply.content,
        tool_calls: outcome.tool_invocations.into_iter().map(ToolCallResponse::from).collect(),
        rounds: outcome.rounds,
    }))
}

#[utoipa::path(
    get,
    path = "/ai/health",
    tag = "ai",
    responses((status = 200, description = "Model provider and cache status", body = AiHealthResponse))
)]
pub async fn ai_health(State(state): State<Arc<AppState>>) -> Json<AiHealthResponse> {
    let agent = state.chat.agent();
    let stats = agent.cache().stats();
    Json(AiHealthResponse {
        status: "ok".into(),
        provider: agent.llm().name().to_owned(),
        model: agent.llm().model().to_owned(),
        tools: agent.tools().schemas().into_iter().map(|s| s.name).collect(),
        cache: CacheStatsResponse { sessions: stats.sessions, hits: stats.hits, misses: stats.misses },
    })
}
