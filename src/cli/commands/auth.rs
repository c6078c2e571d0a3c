use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    with_mfa_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("frontend-base-url")
                .long("frontend-base-url")
                .help("Frontend base URL used for CORS and cookie security")
                .env("GARDISTO_FRONTEND_BASE_URL")
                .default_value("http://localhost:5173"),
        )
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Session cookie TTL in seconds")
                .env("GARDISTO_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("persistent-session-ttl-seconds")
                .long("persistent-session-ttl-seconds")
                .help("Remember-me session TTL in seconds")
                .env("GARDISTO_PERSISTENT_SESSION_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_mfa_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("mfa-token-ttl-seconds")
                .long("mfa-token-ttl-seconds")
                .help("One-time MFA code TTL in seconds")
                .env("GARDISTO_MFA_TOKEN_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("mfa-escalation-threshold")
                .long("mfa-escalation-threshold")
                .help("Consecutive password failures that force MFA")
                .env("GARDISTO_MFA_ESCALATION_THRESHOLD")
                .default_value("5")
                .value_parser(clap::value_parser!(i32)),
        )
        .arg(
            Arg::new("pending-mfa-ttl-seconds")
                .long("pending-mfa-ttl-seconds")
                .help("TTL for a pending MFA login attempt in seconds")
                .env("GARDISTO_PENDING_MFA_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("mfa-max-failed-attempts")
                .long("mfa-max-failed-attempts")
                .help("Failed code submissions before a pending login is dropped")
                .env("GARDISTO_MFA_MAX_FAILED_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub frontend_base_url: String,
    pub session_ttl_seconds: i64,
    pub persistent_session_ttl_seconds: i64,
    pub mfa_token_ttl_seconds: i64,
    pub mfa_escalation_threshold: i32,
    pub pending_mfa_ttl_seconds: i64,
    pub mfa_max_failed_attempts: u32,
}

impl Options {
    /// Extract auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is somehow missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            frontend_base_url: matches
                .get_one::<String>("frontend-base-url")
                .cloned()
                .context("missing required argument: --frontend-base-url")?,
            session_ttl_seconds: matches
                .get_one::<i64>("session-ttl-seconds")
                .copied()
                .context("missing required argument: --session-ttl-seconds")?,
            persistent_session_ttl_seconds: matches
                .get_one::<i64>("persistent-session-ttl-seconds")
                .copied()
                .context("missing required argument: --persistent-session-ttl-seconds")?,
            mfa_token_ttl_seconds: matches
                .get_one::<i64>("mfa-token-ttl-seconds")
                .copied()
                .context("missing required argument: --mfa-token-ttl-seconds")?,
            mfa_escalation_threshold: matches
                .get_one::<i32>("mfa-escalation-threshold")
                .copied()
                .context("missing required argument: --mfa-escalation-threshold")?,
            pending_mfa_ttl_seconds: matches
                .get_one::<i64>("pending-mfa-ttl-seconds")
                .copied()
                .context("missing required argument: --pending-mfa-ttl-seconds")?,
            mfa_max_failed_attempts: matches
                .get_one::<u32>("mfa-max-failed-attempts")
                .copied()
                .context("missing required argument: --mfa-max-failed-attempts")?,
        })
    }
}
