//! Bearer-token authentication.
//!
//! [`require_user`] verifies `Authorization: Bearer <jwt>`, rejects revoked
//! tokens and stores the caller as an [`AuthUser`] request extension, which
//! handlers then take as an extractor.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, OptionalFromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use slotwise_types::UserRole;
use uuid::Uuid;

use crate::auth::{Claims, TokenError};
use crate::error::ServerError;
use crate::services::Actor;
use crate::state::AppState;

pub const SERVICE_TOKEN_HEADER: &str = "x-service-token";

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
    pub jti: Uuid,
    pub exp: i64,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor { id: self.id, role: self.role }
    }
}

impl From<Claims> for AuthUser {
    fn from(c: Claims) -> Self {
        Self { id: c.sub, email: c.email, role: c.role, jti: c.jti, exp: c.exp }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ServerError::Unauthorized("authentication required".into()))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for AuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AuthUser>().cloned())
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verify the bearer token in `headers`.
pub fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<AuthUser, ServerError> {
    let token = bearer_token(headers).ok_or_else(|| ServerError::Unauthorized("missing bearer token".into()))?;
    let claims = state.jwt.verify(token).map_err(|e| match e {
        TokenError::Expired => ServerError::Unauthorized("token expired".into()),
        _ => ServerError::Unauthorized("invalid token".into()),
    })?;
    if state.revoked.is_revoked(claims.jti) {
        return Err(ServerError::Unauthorized("token revoked".into()));
    }
    Ok(claims.into())
}

pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let user = authenticate(&state, req.headers())?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let user = authenticate(&state, req.headers())?;
    if !user.role.is_admin() {
        return Err(ServerError::Forbidden("admin role required".into()));
    }
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Guard for `/ai/*`: the shared service token when one is configured, or a
/// user JWT.
pub async fn require_service_token(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ServerError> {
    if let Some(expected) = state.config.ai_service_token.as_deref() {
        let provided = req.headers().get(SERVICE_TOKEN_HEADER).and_then(|v| v.to_str().ok());
        match provided {
            Some(token) if token == expected => return Ok(next.run(req).await),
            Some(_) => return Err(ServerError::Unauthorized("invalid service token".into())),
            None => {}
        }
    }
    let user = authenticate(&state, req.headers())?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::Config;
    use crate::entities::UserRecord;
    use crate::state::test::memory_state;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{middleware, Router};
    use chrono::{Duration, Utc};
    use tower::ServiceExt;

    fn user(role: UserRole) -> UserRecord {
        let now = Utc::now();
        UserRecord {
            id: Uuid::new_v4(),
            email: "ada@example.com".into(),
            password_hash: String::new(),
            full_name: "Ada".into(),
            role,
            metadata: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }

    async fn whoami(user: AuthUser) -> String {
        user.email
    }

    fn get_with(uri: &str, header: Option<(&str, String)>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn valid_token_passes_and_revoked_token_fails() {
        let state = memory_state(Config::default(), None);
        let app = Router::new()
            .route("/me", get(whoami))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_user));
        let issued = state.jwt.issue(&user(UserRole::Patient), Utc::now()).unwrap();
        let bearer = || Some(("authorization", format!("Bearer {}", issued.token)));

        let ok = app.clone().oneshot(get_with("/me", bearer())).await.unwrap();
        assert_eq!(ok.status(), StatusCode::OK);

        state.revoked.revoke(issued.claims.jti, issued.claims.exp, Utc::now().timestamp());
        let revoked = app.clone().oneshot(get_with("/me", bearer())).await.unwrap();
        assert_eq!(revoked.status(), StatusCode::UNAUTHORIZED);

        let missing = app.oneshot(get_with("/me", None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expired_token_is_rejected() {
        let state = memory_state(Config::default(), None);
        let issued = state
            .jwt
            .issue(&user(UserRole::Patient), Utc::now() - Duration::days(3))
            .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, format!("Bearer {}", issued.token).parse().unwrap());
        let err = authenticate(&state, &headers).unwrap_err();
        assert!(matches!(err, ServerError::Unauthorized(m) if m == "token expired"));
    }

    #[tokio::test]
    async fn admin_guard_checks_role() {
        let state = memory_state(Config::default(), None);
        let app = Router::new()
            .route("/admin", get(whoami))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

        let patient = state.jwt.issue(&user(UserRole::Patient), Utc::now()).unwrap();
        let response = app
            .clone()
            .oneshot(get_with("/admin", Some(("authorization", format!("Bearer {}", patient.token)))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let admin = state.jwt.issue(&user(UserRole::Admin), Utc::now()).unwrap();
        let response = app
            .oneshot(get_with("/admin", Some(("authorization", format!("Bearer {}", admin.token)))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn service_token_or_jwt_unlocks_ai_routes() {
        let config = Config { ai_service_token: Some("s3cret".into()), ..Config::default() };
        let state = memory_state(config, None);
        let app = Router::new()
            .route("/ai", get(|| async { "ok" }))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_service_token));

        let good = app
            .clone()
            .oneshot(get_with("/ai", Some((SERVICE_TOKEN_HEADER, "s3cret".into()))))
            .await
            .unwrap();
        assert_eq!(good.status(), StatusCode::OK);

        let bad = app
            .clone()
            .oneshot(get_with("/ai", Some((SERVICE_TOKEN_HEADER, "guess".into()))))
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::UNAUTHORIZED);

        let token = state.jwt.issue(&user(UserRole::Patient), Utc::now()).unwrap().token;
        let jwt = app
            .oneshot(get_with("/ai", Some(("authorization", format!("Bearer {token}")))))
            .await
            .unwrap();
        assert_eq!(jwt.status(), StatusCode::OK);
    }
}
