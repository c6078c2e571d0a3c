//! One-time token engine for risk-triggered MFA.
//!
//! Flow overview:
//! 1) The login orchestrator asks [`MfaConfig::requires_mfa`] whether a user
//!    must confirm a second factor (permanent opt-in, or escalation after
//!    repeated password failures).
//! 2) [`MfaService::issue_token`] replaces any outstanding code with a fresh
//!    six-digit one, persists its hash with a ten-minute expiry, and hands
//!    the plaintext to the notification sink.
//! 3) [`MfaService::validate_token`] performs an atomic check-and-mark so a
//!    code can be spent at most once, even under concurrent submissions.

pub mod repo;
pub mod service;

pub use service::MfaService;

use crate::identity::SecurityProfile;

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_ESCALATION_THRESHOLD: i32 = 5;
const WARNING_WINDOW: i32 = 3;

/// MFA policy knobs, loaded at startup.
///
/// [`requires_mfa`](Self::requires_mfa) and
/// [`remaining_attempts_warning`](Self::remaining_attempts_warning) are pure
/// functions over a profile snapshot; all mutation stays in the stores.
#[derive(Clone, Copy, Debug)]
pub struct MfaConfig {
    token_ttl_seconds: i64,
    escalation_threshold: i32,
}

impl MfaConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
        }
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_escalation_threshold(mut self, threshold: i32) -> Self {
        self.escalation_threshold = threshold.max(1);
        self
    }

    #[must_use]
    pub fn token_ttl_seconds(&self) -> i64 {
        self.token_ttl_seconds
    }

    #[must_use]
    pub fn escalation_threshold(&self) -> i32 {
        self.escalation_threshold
    }

    /// Whether this user must confirm a second factor.
    ///
    /// True when the user opted in permanently, or when escalation is
    /// enabled for the account and the consecutive-failure count has
    /// reached the threshold.
    #[must_use]
    pub fn requires_mfa(&self, profile: &SecurityProfile) -> bool {
        if profile.require_mfa {
            return true;
        }
        profile.force_mfa_after_failed_attempts
            && profile.failed_login_count >= self.escalation_threshold
    }

    /// Remaining attempts to disclose after a failed password, if any.
    ///
    /// Disclosure is calibrated: nothing on the first failure, a countdown
    /// only once the user is within [`WARNING_WINDOW`] attempts of
    /// escalation. At the threshold itself escalation replaces the warning.
    #[must_use]
    pub fn remaining_attempts_warning(&self, failed_login_count: i32) -> Option<i32> {
        let remaining = self.escalation_threshold - failed_login_count;
        if remaining >= 1 && remaining <= WARNING_WINDOW {
            Some(remaining)
        } else {
            None
        }
    }
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn profile(require_mfa: bool, force_after_failures: bool, failures: i32) -> SecurityProfile {
        SecurityProfile {
            user_id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            display_name: None,
            require_mfa,
            force_mfa_after_failed_attempts: force_after_failures,
            failed_login_count: failures,
            last_failed_login_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn opt_in_always_requires_mfa() {
        let config = MfaConfig::new();
        assert!(config.requires_mfa(&profile(true, false, 0)));
    }

    #[test]
    fn escalation_requires_threshold_failures() {
        let config = MfaConfig::new();
        assert!(!config.requires_mfa(&profile(false, true, 4)));
        assert!(config.requires_mfa(&profile(false, true, 5)));
        assert!(config.requires_mfa(&profile(false, true, 9)));
    }

    #[test]
    fn escalation_disabled_never_triggers() {
        let config = MfaConfig::new();
        assert!(!config.requires_mfa(&profile(false, false, 99)));
    }

    #[test]
    fn warning_only_within_window() {
        let config = MfaConfig::new();
        // Attempt 1: still far from escalation, stay quiet.
        assert_eq!(config.remaining_attempts_warning(1), None);
        // Attempts 2-4 count down: 3, 2, 1 remaining.
        assert_eq!(config.remaining_attempts_warning(2), Some(3));
        assert_eq!(config.remaining_attempts_warning(3), Some(2));
        assert_eq!(config.remaining_attempts_warning(4), Some(1));
        // Attempt 5 escalates instead of warning.
        assert_eq!(config.remaining_attempts_warning(5), None);
        assert_eq!(config.remaining_attempts_warning(6), None);
    }

    #[test]
    fn threshold_override_moves_window() {
        let config = MfaConfig::new().with_escalation_threshold(3);
        assert_eq!(config.remaining_attempts_warning(1), Some(2));
        assert_eq!(config.remaining_attempts_warning(3), None);
        assert!(config.requires_mfa(&profile(false, true, 3)));
    }
}
