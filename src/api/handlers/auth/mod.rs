//! Auth handlers and supporting modules.
//!
//! Endpoints cover the full login lifecycle: registration, credential
//! login, MFA code verification, session introspection, and logout.
//!
//! Flow overview:
//! 1) `POST /v1/auth/login` checks credentials. Depending on policy and
//!    failure history the attempt either completes, is rejected, or parks
//!    behind MFA with a short-lived pending cookie.
//! 2) `POST /v1/auth/mfa/verify` spends the emailed one-time code and
//!    upgrades the pending attempt to a full session.
//! 3) `POST /v1/auth/logout` terminates the session and audits the logout.
//!
//! All failure responses are worded generically so callers cannot probe
//! which accounts exist or why exactly a step failed.

pub(crate) mod login;
pub(crate) mod mfa;
pub(crate) mod rate_limit;
pub(crate) mod register;
pub(crate) mod session;
mod state;
pub(crate) mod types;
mod utils;

pub use rate_limit::NoopRateLimiter;
pub use state::{AuthConfig, AuthState};
