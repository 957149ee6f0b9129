use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

use crate::entities::ChatMessage;
use crate::error::ServerError;
use crate::middleware::AuthUser;
use crate::schemas::api::chatbot::{
    CreateSessionRequest, DeleteSessionResponse, MessageResponse, SendMessageRequest, SendMessageResponse,
    SessionResponse, ToolCallResponse,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(create_session, list_sessions, get_session, delete_session, list_messages, send_message),
    components(schemas(
        CreateSessionRequest,
        SessionResponse,
        DeleteSessionResponse,
        MessageResponse,
        SendMessageRequest,
        SendMessageResponse,
        ToolCallResponse
    ))
)]
pub struct ChatbotApi;

/// Routes nested under `/api/chatbot`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", post(create_session).get(list_sessions))
        .route("/sessions/{id}", get(get_session).delete(delete_session))
        .route("/sessions/{id}/messages", get(list_messages).post(send_message))
}

#[utoipa::path(
    post,
    path = "/api/chatbot/sessions",
    tag = "chatbot",
    request_body = CreateSessionRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, description = "Session created", body = SessionResponse),
        (status = 422, description = "Title too long"),
    )
)]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ServerError> {
    req.validate()?;
    let session = state.chat.create_session(user.id, req.title).await?;
    Ok((StatusCode::CREATED, Json(session.to_response())))
}

#[utoipa::path(
    get,
    path = "/api/chatbot/sessions",
    tag = "chatbot",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The caller's sessions, most recently active first", body = Vec<SessionResponse>),
    )
)]
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<SessionResponse>>, ServerError> {
    let sessions = state.chat.list_sessions(user.id).await?;
    Ok(Json(sessions.iter().map(|s| s.to_response()).collect()))
}

#[utoipa::path(
    get,
    path = "/api/chatbot/sessions/{id}",
    tag = "chatbot",
    params(("id" = Uuid, Path, description = "Session id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The session", body = SessionResponse),
        (status = 404, description = "Session not found"),
    )
)]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ServerError> {
    let session = state.chat.session_for(user.id, id).await?;
    Ok(Json(session.to_response()))
}

#[utoipa::path(
    delete,
    path = "/api/chatbot/sessions/{id}",
    tag = "chatbot",
    params(("id" = Uuid, Path, description = "Session id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Session and its messages deleted", body = DeleteSessionResponse),
        (status = 404, description = "Session not found"),
    )
)]
pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteSessionResponse>, ServerError> {
    state.chat.delete_session(user.id, id).await?;
    Ok(Json(DeleteSessionResponse { deleted: true }))
}

#[utoipa::path(
    get,
    path = "/api/chatbot/sessions/{id}/messages",
    tag = "chatbot",
    params(("id" = Uuid, Path, description = "Session id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Messages, oldest first", body = Vec<MessageResponse>),
        (status = 404, description = "Session not found"),
    )
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MessageResponse>>, ServerError> {
    let messages = state.chat.messages(user.id, id).await?;
    Ok(Json(messages.iter().map(|m| m.to_response()).collect()))
}

/// Send a message and wait for the assistant's answer.
#[utoipa::path(
    post,
    path = "/api/chatbot/sessions/{id}/messages",
    tag = "chatbot",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = SendMessageRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The assistant's reply", body = SendMessageResponse),
        (status = 404, description = "Session not found"),
        (status = 422, description = "Empty or oversized message"),
        (status = 502, description = "The language model failed"),
    )
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, ServerError> {
    req.validate()?;
    if req.content.trim().is_empty() {
        return Err(ServerError::Validation("content: must not be blank".into()));
    }
    let outcome = state.chat.process(user.id, id, &req.content).await?;
    let reply = outcome.reply;
    let message = ChatMessage {
        id: reply.id,
        session_id: id,
        role: reply.role,
        content: reply.content,
        metadata: reply.metadata,
        created_at: reply.created_at,
    };
    Ok(Json(SendMessageResponse {
        reply: message.content.clone(),
        message: message.to_response(),
        tool_calls: outcome.tool_invocations.into_iter().map(ToolCallResponse::from).collect(),
    }))
}
