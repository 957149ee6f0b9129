use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use chrono::Utc;
use serde_json::json;
use slotwise_types::UserRole;
use tracing::info;
use utoipa::OpenApi;
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::{hash_password_blocking, verify_login_blocking};
use crate::entities::{UserRecord, UserStore};
use crate::error::ServerError;
use crate::middleware::auth::require_user;
use crate::middleware::AuthUser;
use crate::schemas::api::auth::{LoginRequest, RegisterRequest, TokenResponse, UserResponse};
use crate::state::AppState;

const BAD_CREDENTIALS: &str = "invalid email or password";

#[derive(OpenApi)]
#[openapi(
    paths(register, login, logout, me),
    components(schemas(RegisterRequest, LoginRequest, TokenResponse, UserResponse))
)]
pub struct AuthApi;

/// Register auth routes. `logout` and `me` need a token.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let with_token = Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route_layer(middleware::from_fn_with_state(state, require_user));
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .merge(with_token)
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = TokenResponse),
        (status = 403, description = "Admin accounts cannot self-register"),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Invalid fields"),
        (status = 429, description = "Too many attempts"),
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ServerError> {
    req.validate()?;
    let role = req.role.unwrap_or_default();
    if role.is_admin() {
        return Err(ServerError::Forbidden("admin accounts cannot be self-registered".into()));
    }

    let now = Utc::now();
    let user = UserRecord {
        id: Uuid::new_v4(),
        email: req.email.trim().to_owned(),
        password_hash: hash_password_blocking(req.password).await?,
        full_name: req.full_name.trim().to_owned(),
        role,
        metadata: json!({}),
        created_at: now,
        updated_at: now,
    };
    state.store.create_user(&user).await?;
    info!(user_id = %user.id, role = %user.role, "user registered");

    let issued = state.jwt.issue(&user, now).map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok((StatusCode::CREATED, Json(TokenResponse::new(issued, &user))))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Unknown email or wrong password"),
        (status = 429, description = "Too many attempts"),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ServerError> {
    req.validate()?;
    let user = state.store.find_user_by_email(req.email.trim()).await?;
    let stored_hash = user.as_ref().map(|u| u.password_hash.clone());
    let verified = verify_login_blocking(req.password, stored_hash).await?;
    let Some(user) = user.filter(|_| verified) else {
        info!("failed login");
        return Err(ServerError::Unauthorized(BAD_CREDENTIALS.into()));
    };
    let issued = state
        .jwt
        .issue(&user, Utc::now())
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(Json(TokenResponse::new(issued, &user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn logout(State(state): State<Arc<AppState>>, user: AuthUser) -> StatusCode {
    state.revoked.revoke(user.jti, user.exp, Utc::now().timestamp());
    info!(user_id = %user.id, "logged out");
    StatusCode::NO_CONTENT
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "The caller", body = UserResponse),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn me(State(state): State<Arc<AppState>>, user: AuthUser) -> Result<Json<UserResponse>, ServerError> {
    let record = state
        .store
        .get_user(user.id)
        .await?
        .ok_or_else(|| ServerError::Unauthorized("account no longer exists".into()))?;
    Ok(Json(record.to_response()))
}

#[cfg(test)]
mod test {
    use crate::routes::test::{app_with, json_body, quiet_config, register, request};
    use crate::config::Config;
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;
    use tracing_test::traced_test;

    #[tokio::test]
    async fn register_login_me_logout() {
        let (app, _) = app_with(quiet_config());
        let (token, id) = register(&app, "ada@example.com", "patient").await;

        let me = app.clone().oneshot(request(Method::GET, "/api/auth/me", Some(&token), None)).await.unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(json_body(me).await["id"], id);

        let login = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "ADA@example.com", "password": "correct horse"})),
            ))
            .await
            .unwrap();
        assert_eq!(login.status(), StatusCode::OK);
        let body = json_body(login).await;
        assert_eq!(body["token_type"], "Bearer");

        let logout = app.clone().oneshot(request(Method::POST, "/api/auth/logout", Some(&token), None)).await.unwrap();
        assert_eq!(logout.status(), StatusCode::NO_CONTENT);
        let again = app.oneshot(request(Method::GET, "/api/auth/me", Some(&token), None)).await.unwrap();
        assert_eq!(again.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_failures_look_the_same() {
        let (app, _) = app_with(quiet_config());
        register(&app, "ada@example.com", "patient").await;

        let mut messages = Vec::new();
        for (email, password) in [("ada@example.com", "wrong password"), ("nobody@example.com", "correct horse")] {
            let response = app
                .clone()
                .oneshot(request(
                    Method::POST,
                    "/api/auth/login",
                    None,
                    Some(json!({"email": email, "password": password})),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            messages.push(json_body(response).await["error"].clone());
        }
        assert_eq!(messages[0], messages[1]);
    }

    #[tokio::test]
    #[traced_test]
    async fn unknown_email_still_runs_the_password_check() {
        let (app, _) = app_with(quiet_config());
        let response = app
            .oneshot(request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "nobody@example.com", "password": "correct horse"})),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(logs_contain("verifying against placeholder hash"));
    }

    #[tokio::test]
    async fn duplicate_email_and_admin_role_are_refused() {
        let (app, _) = app_with(quiet_config());
        register(&app, "ada@example.com", "patient").await;

        let body = json!({"email": "Ada@Example.com", "password": "correct horse", "full_name": "Ada"});
        let dup = app.clone().oneshot(request(Method::POST, "/api/auth/register", None, Some(body))).await.unwrap();
        assert_eq!(dup.status(), StatusCode::CONFLICT);

        let body = json!({"email": "root@example.com", "password": "correct horse", "full_name": "Root", "role": "admin"});
        let admin = app.clone().oneshot(request(Method::POST, "/api/auth/register", None, Some(body))).await.unwrap();
        assert_eq!(admin.status(), StatusCode::FORBIDDEN);

        let body = json!({"email": "not-an-email", "password": "short", "full_name": "X"});
        let invalid = app.oneshot(request(Method::POST, "/api/auth/register", None, Some(body))).await.unwrap();
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn auth_routes_are_rate_limited() {
        let (app, _) = app_with(Config { auth_rate_limit_per_minute: 2, ..quiet_config() });
        let attempt = || {
            request(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({"email": "ada@example.com", "password": "whatever1"})),
            )
        };
        for _ in 0..2 {
            let response = app.clone().oneshot(attempt()).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        let limited = app.oneshot(attempt()).await.unwrap();
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
