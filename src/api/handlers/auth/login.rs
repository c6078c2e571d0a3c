//! Credential login endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Json},
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::error;

use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::{pending_cookie, session_cookie_with_ttl};
use super::state::AuthState;
use super::types::{LoginRequest, LoginResponse};
use super::utils::{extract_client_ip, normalize_email, valid_email};
use crate::login::outcome::{
    INVALID_CREDENTIALS_MESSAGE, LoginOutcome, remaining_attempts_message,
};
use crate::login::{LoginOrchestrator, RequestContext};

#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in or parked behind MFA", body = LoginResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Invalid credentials", body = LoginResponse),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    orchestrator: Extension<LoginOrchestrator>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email_normalized = normalize_email(&request.email);
    if !valid_email(&email_normalized) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Login)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }
    if auth_state
        .rate_limiter()
        .check_email(&email_normalized, RateLimitAction::Login)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let ctx = RequestContext {
        context: "auth/login",
        request_path: "/v1/auth/login".to_string(),
        client_ip,
    };
    let password = SecretString::from(request.password);

    let outcome = match orchestrator
        .attempt_login(
            &email_normalized,
            &password,
            request.remember_me,
            request.return_to.as_deref(),
            &ctx,
        )
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("Login failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            )
                .into_response();
        }
    };

    match outcome {
        LoginOutcome::Authenticated {
            session_token,
            session_ttl_seconds,
            redirect_to,
        } => {
            let mut response = LoginResponse::status_only("authenticated");
            response.redirect_to = Some(redirect_to);
            let mut response_headers = HeaderMap::new();
            match session_cookie_with_ttl(&auth_state, &session_token, session_ttl_seconds) {
                Ok(cookie) => {
                    response_headers.insert(SET_COOKIE, cookie);
                    (StatusCode::OK, response_headers, Json(response)).into_response()
                }
                Err(err) => {
                    error!("Failed to set session cookie: {err}");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        LoginOutcome::MfaRequired { pending_id, reason } => {
            let response = LoginResponse::with_message("mfa_required", reason.user_message());
            let mut response_headers = HeaderMap::new();
            match pending_cookie(&auth_state, pending_id) {
                Ok(cookie) => {
                    response_headers.insert(SET_COOKIE, cookie);
                    (StatusCode::OK, response_headers, Json(response)).into_response()
                }
                Err(err) => {
                    error!("Failed to set pending MFA cookie: {err}");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        LoginOutcome::InvalidCredentials { remaining_attempts } => {
            let mut response =
                LoginResponse::with_message("invalid_credentials", INVALID_CREDENTIALS_MESSAGE);
            response.warning = remaining_attempts.map(remaining_attempts_message);
            (StatusCode::UNAUTHORIZED, Json(response)).into_response()
        }
        // Credential submission never yields MFA-completion outcomes.
        LoginOutcome::MfaInvalid | LoginOutcome::SessionExpired => {
            error!("Unexpected outcome from credential login");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
