//! MFA code verification endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::error;

use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::{clear_pending_cookie, extract_pending_id, session_cookie_with_ttl};
use super::state::AuthState;
use super::types::{LoginResponse, MfaVerifyRequest};
use super::utils::extract_client_ip;
use crate::login::outcome::{LoginOutcome, MFA_INVALID_MESSAGE, SESSION_EXPIRED_MESSAGE};
use crate::login::{LoginOrchestrator, RequestContext};

#[utoipa::path(
    post,
    path = "/v1/auth/mfa/verify",
    request_body = MfaVerifyRequest,
    responses(
        (status = 200, description = "Code accepted, signed in", body = LoginResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Invalid code or expired pending session", body = LoginResponse),
        (status = 429, description = "Rate limited", body = String)
    ),
    tag = "auth"
)]
pub async fn verify(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
    orchestrator: Extension<LoginOrchestrator>,
    payload: Option<Json<MfaVerifyRequest>>,
) -> impl IntoResponse {
    let request: MfaVerifyRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let client_ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(client_ip.as_deref(), RateLimitAction::MfaVerify)
        == RateLimitDecision::Limited
    {
        return (StatusCode::TOO_MANY_REQUESTS, "Rate limited".to_string()).into_response();
    }

    let ctx = RequestContext {
        context: "auth/mfa-verify",
        request_path: "/v1/auth/mfa/verify".to_string(),
        client_ip,
    };
    let pending_id = extract_pending_id(&headers);

    let outcome = match orchestrator
        .complete_mfa(pending_id, &request.code, &ctx)
        .await
    {
        Ok(outcome) => outcome,
        Err(err) => {
            error!("MFA verification failed: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Verification failed".to_string(),
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
                    if let Ok(cleared) = clear_pending_cookie(&auth_state) {
                        response_headers.append(SET_COOKIE, cleared);
                    }
                    (StatusCode::OK, response_headers, Json(response)).into_response()
                }
                Err(err) => {
                    error!("Failed to set session cookie: {err}");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            }
        }
        LoginOutcome::MfaInvalid => {
            let response = LoginResponse::with_message("mfa_invalid", MFA_INVALID_MESSAGE);
            (StatusCode::UNAUTHORIZED, Json(response)).into_response()
        }
        LoginOutcome::SessionExpired => {
            let response = LoginResponse::with_message("session_expired", SESSION_EXPIRED_MESSAGE);
            let mut response_headers = HeaderMap::new();
            if let Ok(cleared) = clear_pending_cookie(&auth_state) {
                response_headers.insert(SET_COOKIE, cleared);
            }
            (StatusCode::UNAUTHORIZED, response_headers, Json(response)).into_response()
        }
        // Code submission never yields credential-phase outcomes.
        LoginOutcome::MfaRequired { .. } | LoginOutcome::InvalidCredentials { .. } => {
            error!("Unexpected outcome from MFA verification");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
