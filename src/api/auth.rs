//! `/auth` endpoints and the authenticated-user extractor.
//!
//! POST bodies carry an `action` field that selects the operation; GET
//! supports `?action=me`.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequestParts, Query, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::error::ApiError;
use super::metrics;
use super::parse_json;
use super::validation::{validate_email, validate_password, validate_registration};
use crate::auth::accounts::{self, NewUser};
use crate::auth::rate_limit::client_identifier;
use crate::auth::{AuthError, RateLimitAction, TokenKind};
use crate::config::RateLimitPolicy;
use crate::db::{
    AuthResponse, ConfirmResetRequest, LoginRequest, MeResponse, RefreshRequest, RefreshResponse,
    RegisterRequest, ResetPasswordRequest, User, UserResponse,
};
use crate::AppState;

/// Header carrying `Bearer <access token>`
pub const AUTH_HEADER: &str = "x-authorization";

/// Pull the access token out of `X-Authorization`
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTH_HEADER)?.to_str().ok()?.trim();
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// The user behind a valid access token
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or(AuthError::Unauthenticated)?;
        let user = state.sessions.authenticate(&token).await?;
        Ok(CurrentUser(user))
    }
}

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    pub action: Option<String>,
}

/// GET /auth?action=me
pub async fn auth_get(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, ApiError> {
    match query.action.as_deref() {
        Some("me") => {
            let token = extract_token(&headers).ok_or(AuthError::Unauthenticated)?;
            let user = state.sessions.authenticate(&token).await?;
            Ok(Json(MeResponse {
                user: UserResponse::from(user),
            }))
        }
        other => Err(ApiError::bad_request(format!(
            "Unknown action: {}",
            other.unwrap_or("<missing>")
        ))),
    }
}

/// POST /auth
pub async fn auth_post(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let payload: Value = parse_json(&body)?;
    let action = payload
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    match action.as_str() {
        "login" => login(&state, &headers, from_payload(payload)?).await,
        "register" => register(&state, &headers, from_payload(payload)?).await,
        "refresh" => refresh(&state, from_payload(payload)?).await,
        "logout" => logout(&state, &headers).await,
        "reset-password" => reset_password(&state, &headers, from_payload(payload)?).await,
        "confirm-reset" => confirm_reset(&state, from_payload(payload)?).await,
        "" => Err(ApiError::bad_request("action is required")),
        other => Err(ApiError::bad_request(format!("Unknown action: {}", other))),
    }
}

fn from_payload<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T, ApiError> {
    serde_json::from_value(payload)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}

async fn check_rate_limit(
    state: &AppState,
    headers: &HeaderMap,
    action: RateLimitAction,
    policy: RateLimitPolicy,
) -> Result<(), ApiError> {
    let identifier = client_identifier(headers);
    let decision = state.rate_limiter.check(&identifier, action, policy).await?;
    if !decision.allowed {
        metrics::record_rate_limited(action.as_str());
        warn!(identifier = %identifier, action = action.as_str(), "Auth attempt rate limited");
    }
    decision.into_result().map_err(ApiError::from)
}

async fn issue_tokens(state: &AppState, user: User, status: StatusCode) -> Result<Response, ApiError> {
    let issued = state.sessions.create_session(user.id).await?;
    let body = AuthResponse {
        access_token: issued.access_token,
        refresh_token: issued.refresh_token,
        expires_in: state.sessions.access_ttl_seconds(),
        user: UserResponse::from(user),
    };
    Ok((status, Json(body)).into_response())
}

async fn login(state: &AppState, headers: &HeaderMap, req: LoginRequest) -> Result<Response, ApiError> {
    check_rate_limit(state, headers, RateLimitAction::Login, state.config.rate_limit.login).await?;

    if req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let user = match accounts::verify_credentials(&state.db, &req.email, &req.password).await {
        Ok(user) => user,
        Err(e) => {
            metrics::record_login(false);
            return Err(e.into());
        }
    };

    metrics::record_login(true);
    info!(user_id = user.id, "User logged in");
    issue_tokens(state, user, StatusCode::OK).await
}

async fn register(
    state: &AppState,
    headers: &HeaderMap,
    req: RegisterRequest,
) -> Result<Response, ApiError> {
    check_rate_limit(state, headers, RateLimitAction::Register, state.config.rate_limit.register)
        .await?;

    validate_registration(&req, state.config.auth.min_password_length)?;

    let phone = req
        .phone
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());
    let user = accounts::register(
        &state.db,
        NewUser {
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            phone,
        },
    )
    .await?;

    issue_tokens(state, user, StatusCode::CREATED).await
}

async fn refresh(state: &AppState, req: RefreshRequest) -> Result<Response, ApiError> {
    let refresh_token = req
        .refresh_token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("refresh_token is required"))?;

    let refreshed = state.sessions.refresh(&refresh_token).await?;
    Ok(Json(RefreshResponse {
        access_token: refreshed.access_token,
        expires_in: state.sessions.access_ttl_seconds(),
    })
    .into_response())
}

async fn logout(state: &AppState, headers: &HeaderMap) -> Result<Response, ApiError> {
    let token = extract_token(headers).ok_or(AuthError::Unauthenticated)?;

    if state.sessions.revoke(&token, TokenKind::Access).await? {
        Ok(Json(json!({ "message": "Logged out" })).into_response())
    } else {
        Err(ApiError::not_found("Session not found"))
    }
}

async fn reset_password(
    state: &AppState,
    headers: &HeaderMap,
    req: ResetPasswordRequest,
) -> Result<Response, ApiError> {
    check_rate_limit(
        state,
        headers,
        RateLimitAction::ResetPassword,
        state.config.rate_limit.reset_password,
    )
    .await?;

    let email = accounts::normalize_email(&req.email);
    if email.is_empty() {
        return Err(ApiError::validation_field("email", "Email is required"));
    }
    validate_email(&email).map_err(|msg| ApiError::validation_field("email", msg))?;

    if let Some(token) = state.resets.request_reset(&email, Utc::now()).await? {
        let url = format!(
            "{}/reset-password?token={}",
            state.config.server.site_url.trim_end_matches('/'),
            token
        );
        if let Err(e) = state.notifier.send_reset_link(&email, &url).await {
            error!("Failed to deliver reset link: {:#}", e);
            return Err(ApiError::internal("Failed to send reset instructions"));
        }
    }

    Ok(Json(json!({
        "message": "If the email is registered, reset instructions have been sent"
    }))
    .into_response())
}

async fn confirm_reset(state: &AppState, req: ConfirmResetRequest) -> Result<Response, ApiError> {
    let token = req.token.trim();
    if token.is_empty() || req.new_password.is_empty() {
        return Err(ApiError::bad_request("token and new_password are required"));
    }
    validate_password(&req.new_password, state.config.auth.min_password_length)
        .map_err(|msg| ApiError::validation_field("new_password", msg))?;

    state
        .resets
        .confirm_reset(token, &req.new_password, Utc::now())
        .await?;

    Ok(Json(json!({ "message": "Password has been reset" })).into_response())
}
