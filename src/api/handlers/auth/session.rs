//! Session endpoints and cookie plumbing.
//!
//! Two cookies are involved: the long-lived session cookie and the
//! short-lived pending-MFA cookie that keys a parked login attempt. Both
//! are server-side references; the browser never sees tokens or codes
//! beyond the opaque values here.

use axum::{
    extract::Extension,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE},
    },
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use super::state::AuthState;
use super::types::SessionResponse;
use super::utils::extract_client_ip;
use crate::identity::CredentialProvider;
use crate::identity::provider::hash_session_token;
use crate::login::{LoginOrchestrator, RequestContext};

const SESSION_COOKIE_NAME: &str = "gardisto_session";
const PENDING_COOKIE_NAME: &str = "gardisto_mfa";

#[utoipa::path(
    get,
    path = "/v1/auth/session",
    responses(
        (status = 200, description = "Session is active", body = SessionResponse),
        (status = 204, description = "No active session")
    ),
    tag = "auth"
)]
pub async fn session(
    headers: HeaderMap,
    provider: Extension<CredentialProvider>,
) -> impl IntoResponse {
    // Missing cookies are treated as "no session" to avoid leaking auth state.
    let Some(token) = extract_session_token(&headers) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let token_hash = hash_session_token(&token);
    match provider.lookup_session(&token_hash).await {
        Ok(Some(record)) => {
            let response = SessionResponse {
                user_id: record.user_id.to_string(),
                email: record.email,
                display_name: record.display_name,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Ok(None) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            error!("Failed to lookup session: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Session cleared")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    orchestrator: Extension<LoginOrchestrator>,
) -> impl IntoResponse {
    let ctx = RequestContext {
        context: "auth/logout",
        request_path: "/v1/auth/logout".to_string(),
        client_ip: extract_client_ip(&headers),
    };
    let token = extract_session_token(&headers);
    if let Err(err) = orchestrator.logout(token.as_deref(), &ctx).await {
        error!("Failed to terminate session: {err}");
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_cookie(&auth_state, SESSION_COOKIE_NAME) {
        response_headers.append(SET_COOKIE, cookie);
    }
    if let Ok(cookie) = clear_cookie(&auth_state, PENDING_COOKIE_NAME) {
        response_headers.append(SET_COOKIE, cookie);
    }
    (StatusCode::NO_CONTENT, response_headers).into_response()
}

/// Build a secure `HttpOnly` cookie carrying the raw session token.
pub(super) fn session_cookie_with_ttl(
    auth_state: &AuthState,
    token: &str,
    ttl_seconds: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(auth_state, SESSION_COOKIE_NAME, token, ttl_seconds)
}

/// Build the short-lived cookie keying a pending MFA continuation.
pub(super) fn pending_cookie(
    auth_state: &AuthState,
    pending_id: Uuid,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(
        auth_state,
        PENDING_COOKIE_NAME,
        &pending_id.to_string(),
        auth_state.config().pending_mfa_ttl_seconds(),
    )
}

pub(super) fn clear_pending_cookie(
    auth_state: &AuthState,
) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(auth_state, PENDING_COOKIE_NAME, "", 0)
}

fn clear_cookie(auth_state: &AuthState, name: &str) -> Result<HeaderValue, InvalidHeaderValue> {
    build_cookie(auth_state, name, "", 0)
}

fn build_cookie(
    auth_state: &AuthState,
    name: &str,
    value: &str,
    ttl_seconds: i64,
) -> Result<HeaderValue, InvalidHeaderValue> {
    // Only mark cookies secure when the frontend is served over HTTPS.
    let secure = auth_state.config().session_cookie_secure();
    let mut cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    cookie_value(headers, SESSION_COOKIE_NAME)
}

/// Resolve the pending-MFA continuation id from its cookie, if present.
pub(super) fn extract_pending_id(headers: &HeaderMap) -> Option<Uuid> {
    cookie_value(headers, PENDING_COOKIE_NAME)
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
