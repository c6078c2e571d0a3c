//! # Gardisto (Adaptive MFA Authentication Gateway)
//!
//! `gardisto` layers risk-triggered multi-factor authentication on top of
//! credential login. Password sign-in works as usual until a user either
//! opts in to MFA or accumulates too many consecutive failures; at that
//! point the gateway escalates, emails a short-lived one-time code, and
//! holds the login in a pending state until the code is confirmed.
//!
//! ## Login state machine
//!
//! 1) Credentials are verified against the stored Argon2id hash.
//! 2) On success the failed-attempt counter resets; if the user's policy
//!    requires MFA, a six-digit code is issued and the attempt parks in a
//!    pending session instead of completing.
//! 3) On failure the counter increments; the fifth consecutive failure
//!    escalates to mandatory MFA when the user's policy allows it.
//! 4) Confirming the code consumes the pending session, resets counters,
//!    and issues the server-side session.
//!
//! ## Security boundaries
//!
//! - Error responses never reveal whether an account exists.
//! - One-time codes are single-use, expire after ten minutes, and only a
//!   hash of the code is persisted.
//! - Every state transition is written to an append-only audit trail;
//!   audit failures never block the login flow.
//! - Redirect targets are re-validated as local paths before use.

pub mod api;
pub mod audit;
pub mod cli;
pub mod email;
pub mod identity;
pub mod login;
pub mod mfa;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
