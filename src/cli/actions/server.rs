use crate::api;
use crate::mfa::MfaConfig;
use anyhow::Result;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub persistent_session_ttl_seconds: i64,
    pub mfa_token_ttl_seconds: i64,
    pub mfa_escalation_threshold: i32,
    pub pending_mfa_ttl_seconds: i64,
    pub mfa_max_failed_attempts: u32,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("starting server with {args:?}");

    let auth_config = api::AuthConfig::new(args.frontend_base_url)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_persistent_session_ttl_seconds(args.persistent_session_ttl_seconds)
        .with_pending_mfa_ttl_seconds(args.pending_mfa_ttl_seconds)
        .with_mfa_max_failed_attempts(args.mfa_max_failed_attempts);

    let mfa_config = MfaConfig::new()
        .with_token_ttl_seconds(args.mfa_token_ttl_seconds)
        .with_escalation_threshold(args.mfa_escalation_threshold);

    api::new(args.port, args.dsn, auth_config, mfa_config).await
}
