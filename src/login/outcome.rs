//! Outcome taxonomy for the login state machine.
//!
//! Every user-facing message here is worded to avoid revealing whether an
//! account exists or why exactly a step failed.

use uuid::Uuid;

/// Generic credential-failure message; identical for unknown emails and
/// wrong passwords.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password.";

/// Generic MFA-failure message; identical for wrong, reused, and expired
/// codes.
pub const MFA_INVALID_MESSAGE: &str = "Invalid or expired verification code.";

pub const SESSION_EXPIRED_MESSAGE: &str =
    "Your verification session has expired. Please sign in again.";

/// Why a login attempt was parked in the MFA state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MfaReason {
    /// The user permanently opted in to MFA.
    PolicyOptIn,
    /// Escalation after repeated wrong-password attempts.
    TooManyFailures,
}

impl MfaReason {
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::PolicyOptIn => {
                "To keep your account secure, please confirm this sign-in with the code we just sent you."
            }
            Self::TooManyFailures => {
                "To protect your account, additional verification is required after several unsuccessful sign-in attempts."
            }
        }
    }
}

/// Result of a credential or MFA submission.
#[derive(Debug)]
pub enum LoginOutcome {
    /// Fully signed in; the raw session token goes to the cookie.
    Authenticated {
        session_token: String,
        session_ttl_seconds: i64,
        redirect_to: String,
    },
    /// Parked pending a one-time code; `pending_id` keys the continuation.
    MfaRequired {
        pending_id: Uuid,
        reason: MfaReason,
    },
    /// Credential check failed. `remaining_attempts` is disclosed only close
    /// to the escalation threshold.
    InvalidCredentials { remaining_attempts: Option<i32> },
    /// Submitted code was wrong, reused, or expired; the pending session is
    /// retained for a retry.
    MfaInvalid,
    /// No pending MFA continuation exists (expired or never created).
    SessionExpired,
}

/// Result of an account registration.
#[derive(Debug)]
pub enum RegisterOutcome {
    Created {
        session_token: String,
        session_ttl_seconds: i64,
    },
    /// Email already taken. The HTTP layer keeps the response body generic.
    Conflict,
}

/// Warning text disclosing the attempts left before escalation.
#[must_use]
pub fn remaining_attempts_message(remaining: i32) -> String {
    let noun = if remaining == 1 { "attempt" } else { "attempts" };
    format!("You have {remaining} {noun} remaining before additional verification is required.")
}
