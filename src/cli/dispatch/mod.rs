//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the
//! appropriate action, such as starting the API server with its full
//! configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        frontend_base_url: auth_opts.frontend_base_url,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        persistent_session_ttl_seconds: auth_opts.persistent_session_ttl_seconds,
        mfa_token_ttl_seconds: auth_opts.mfa_token_ttl_seconds,
        mfa_escalation_threshold: auth_opts.mfa_escalation_threshold,
        pending_mfa_ttl_seconds: auth_opts.pending_mfa_ttl_seconds,
        mfa_max_failed_attempts: auth_opts.mfa_max_failed_attempts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;

    #[test]
    fn dsn_required() {
        temp_env::with_vars([("GARDISTO_DSN", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let result = command.try_get_matches_from(vec!["gardisto"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn defaults_flow_into_server_args() {
        temp_env::with_vars(
            [
                ("GARDISTO_DSN", None::<&str>),
                ("GARDISTO_PORT", None),
                ("GARDISTO_SESSION_TTL_SECONDS", None),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command
                    .try_get_matches_from(vec![
                        "gardisto",
                        "--dsn",
                        "postgres://user@localhost:5432/gardisto",
                    ])
                    .expect("matches");
                let action = handler(&matches).expect("action");
                let Action::Server(args) = action;
                assert_eq!(args.port, 8080);
                assert_eq!(args.session_ttl_seconds, 43200);
                assert_eq!(args.mfa_escalation_threshold, 5);
                assert_eq!(args.pending_mfa_ttl_seconds, 600);
            },
        );
    }

    #[test]
    fn threshold_override_is_parsed() {
        temp_env::with_vars([("GARDISTO_DSN", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let matches = command
                .try_get_matches_from(vec![
                    "gardisto",
                    "--dsn",
                    "postgres://user@localhost:5432/gardisto",
                    "--mfa-escalation-threshold",
                    "3",
                ])
                .expect("matches");
            let action = handler(&matches).expect("action");
            let Action::Server(args) = action;
            assert_eq!(args.mfa_escalation_threshold, 3);
        });
    }
}
