pub mod admin;
pub mod appointments;
pub mod auth;
pub mod chatbot;
pub mod providers;

use crate::middleware::auth::{require_admin, require_user};
use crate::middleware::rate_limit::{limit_api, limit_auth};
use crate::state::AppState;
use axum::{middleware, Router};
use std::sync::Arc;
use utoipa::OpenApi;

/// Routes nested under `/api`.
///
/// `/auth` sits behind the stricter auth limiter; everything else needs a
/// JWT and counts against the general limiter.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let auth = auth::router(state.clone())
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_auth));

    let protected = Router::new()
        .merge(providers::router())
        .nest("/appointments", appointments::router())
        .nest("/chatbot", chatbot::router())
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_api));

    let admin = admin::router()
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), limit_api));

    Router::new()
        .nest("/auth", auth)
        .nest("/admin", admin)
        .merge(protected)
}

#[derive(OpenApi)]
#[openapi()]
pub struct RestApi;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = RestApi::openapi();
    spec.merge(auth::AuthApi::openapi());
    spec.merge(providers::ProvidersApi::openapi());
    spec.merge(appointments::AppointmentsApi::openapi());
    spec.merge(chatbot::ChatbotApi::openapi());
    spec.merge(admin::AdminApi::openapi());
    spec
}
