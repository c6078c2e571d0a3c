//! Account registration endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Json},
};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::error;

use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::session_cookie_with_ttl;
use super::state::AuthState;
use super::types::{LoginResponse, RegisterRequest};
use super::utils::{extract_client_ip, normalize_email, valid_email, valid_password};
use crate::login::outcome::RegisterOutcome;
use crate::login::{LoginOrchestrator, RequestContext};

#[utoipa::path(
    post,
    path = "/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = LoginResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 409, description = "Email already registered", body = String),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    orchestrator: Extension<LoginOrchestrator>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email_normalized = normalize_email(&request.email);
    if !valid_email(&email_normalized) {
        return (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response();
    }
    if !valid_password(&request.password) {
        return (StatusCode::BAD_REQUEST, "Invalid password".to_string()).into_response();
    }
    let display_name = request
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::Register)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }
    if auth_state
        .rate_limiter()
        .check_email(&email_normalized, RateLimitAction::Register)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let ctx = RequestContext {
        context: "auth/register",
        request_path: "/v1/auth/register".to_string(),
        client_ip,
    };
    let password = SecretString::from(request.password);

    match orchestrator
        .register(&email_normalized, display_name, &password, &ctx)
        .await
    {
        Ok(RegisterOutcome::Created {
            session_token,
            session_ttl_seconds,
        }) => {
            let mut response = LoginResponse::status_only("authenticated");
            response.redirect_to = Some("/".to_string());
            let mut response_headers = HeaderMap::new();
            match session_cookie_with_ttl(&auth_state, &session_token, session_ttl_seconds) {
                Ok(cookie) => {
                    response_headers.insert(SET_COOKIE, cookie);
                    (StatusCode::CREATED, response_headers, Json(response)).into_response()
                }
                Err(err) => {
                    error!("Failed to set session cookie: {err}");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        Ok(RegisterOutcome::Conflict) => (
            StatusCode::CONFLICT,
            "An account with this email already exists".to_string(),
        )
            .into_response(),
        Err(err) => {
            error!("Registration failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed".to_string(),
            )
                .into_response()
        }
    }
}
