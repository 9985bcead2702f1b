//! API key authentication.
//!
//! `auth_middleware` resolves `Authorization: Bearer <api_key>` to a user and
//! injects [`CurrentUser`] into request extensions.

use super::error::ApiError;
use super::state::AppState;
use crate::domain::User;
use axum::{
    extract::{FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Authenticated caller, set by the auth middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Caller on routes that also serve anonymous requests.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

/// Extract a Bearer token from an Authorization header value.
fn bearer_token_from_header(header_value: &str) -> Result<&str, ApiError> {
    let invalid = || ApiError::unauthorized("Missing or invalid authorization");
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next().ok_or_else(invalid)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(invalid());
    }
    let token = parts.next().ok_or_else(invalid)?;
    if token.is_empty() {
        return Err(invalid());
    }
    Ok(token)
}

async fn resolve(state: &AppState, header_value: &str) -> Result<User, ApiError> {
    let token = bearer_token_from_header(header_value)?;
    match state.auth.authenticate(token).await? {
        Some(user) => {
            debug!(user_id = user.id, "authenticated");
            Ok(user)
        }
        None => Err(ApiError::unauthorized("Invalid API key")),
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Missing or invalid authorization"))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts.extensions.get::<CurrentUser>().map(|c| c.0.clone()),
        ))
    }
}

/// Rejects requests without a valid API key.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing or invalid authorization"))?;
    let user = resolve(&state, header).await?;
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Like [`auth_middleware`], but lets requests without an Authorization header
/// through anonymously. A present but invalid key is still rejected.
pub async fn optional_auth_middleware(
    State(state): State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);
    if let Some(header) = header {
        let user = resolve(&state, &header).await?;
        req.extensions_mut().insert(CurrentUser(user));
    }
    Ok(next.run(req).await)
}
