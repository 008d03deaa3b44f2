//! Auth Routes
//!
//! Thin passthrough to the upstream auth provider. Credentials are
//! normalized (trimmed email, smart quotes mapped to ASCII in the
//! password) before forwarding; provider error messages come back
//! verbatim.
//!
//! - POST /api/v1/auth/signin - Exchange credentials for a session
//! - POST /api/v1/auth/signup - Create an account
//! - POST /api/v1/auth/signout - Invalidate a token
//! - GET /api/v1/auth/session - Look up the user behind a token
//! - POST /api/v1/auth/recover - Request a password-reset email
//! - POST /api/v1/auth/verify - Redeem a recovery token
//! - POST /api/v1/auth/invite - Invite a user (service token)
//! - GET /api/v1/auth/users - List users (service token)

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use crate::api::dto::{CredentialsRequest, InviteRequest, RecoverRequest, VerifyRequest};
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::auth::{AuthClient, AuthSession, AuthUser};

fn provider(state: &AppState) -> ApiResult<Arc<AuthClient>> {
    state
        .auth
        .clone()
        .ok_or_else(|| ApiError::ServiceUnavailable("no auth provider configured".to_string()))
}

fn bearer_token(headers: &HeaderMap) -> ApiResult<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::Validation("missing bearer token".to_string()))
}

/// POST /api/v1/auth/signin
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<Json<AuthSession>> {
    let session = provider(&state)?.sign_in(&req.email, &req.password).await?;
    Ok(Json(session))
}

/// POST /api/v1/auth/signup
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> ApiResult<(StatusCode, Json<AuthSession>)> {
    let session = provider(&state)?.sign_up(&req.email, &req.password).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/v1/auth/signout
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let token = bearer_token(&headers)?;
    provider(&state)?.sign_out(token).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/session
pub async fn session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<AuthUser>> {
    let token = bearer_token(&headers)?;
    let user = provider(&state)?.session(token).await?;
    Ok(Json(user))
}

/// POST /api/v1/auth/recover
///
/// Always 202: whether the address exists is the provider's secret.
pub async fn recover(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecoverRequest>,
) -> ApiResult<StatusCode> {
    provider(&state)?.request_password_reset(&req.email).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/auth/verify
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<AuthSession>> {
    let session = provider(&state)?.verify_recovery_token(&req.token).await?;
    Ok(Json(session))
}

/// POST /api/v1/auth/invite
pub async fn invite(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<InviteRequest>,
) -> ApiResult<Json<AuthUser>> {
    let token = bearer_token(&headers)?;
    let user = provider(&state)?.invite_user(&req.email, token).await?;
    Ok(Json(user))
}

/// GET /api/v1/auth/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<AuthUser>>> {
    let token = bearer_token(&headers)?;
    let users = provider(&state)?.list_users(token).await?;
    Ok(Json(users))
}
