use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::api::appointments::ProviderResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(list_providers), components(schemas(ProviderResponse)))]
pub struct ProvidersApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/providers", get(list_providers))
}

/// Everyone who can be booked.
#[utoipa::path(
    get,
    path = "/api/providers",
    tag = "appointments",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Provider list", body = Vec<ProviderResponse>),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<ProviderResponse>>, ServerError> {
    let providers = state.booking.providers().await?;
    Ok(Json(providers.iter().map(|p| p.to_provider_response()).collect()))
}
