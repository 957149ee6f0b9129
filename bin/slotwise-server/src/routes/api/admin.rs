use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::api::admin::{InteractionQuery, InteractionResponse};
use crate::state::AppState;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

#[derive(OpenApi)]
#[openapi(paths(list_interactions), components(schemas(InteractionResponse)))]
pub struct AdminApi;

/// Routes nested under `/api/admin`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/interactions", get(list_interactions))
}

/// Recent chat turns with their tool calls and latency.
#[utoipa::path(
    get,
    path = "/api/admin/interactions",
    tag = "admin",
    params(InteractionQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Newest first", body = Vec<InteractionResponse>),
        (status = 403, description = "Caller is not an admin"),
    )
)]
pub async fn list_interactions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InteractionQuery>,
) -> Result<Json<Vec<InteractionResponse>>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let logs = state.chat.interactions(query.user_id, limit).await?;
    Ok(Json(logs.iter().map(|l| l.to_response()).collect()))
}
