//! Auth configuration and shared handler state.

use std::sync::Arc;

use super::rate_limit::RateLimiter;
use crate::login::SessionTtls;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 12 * 60 * 60;
const DEFAULT_PERSISTENT_SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_PENDING_MFA_TTL_SECONDS: i64 = 10 * 60;
const DEFAULT_MFA_MAX_FAILED_ATTEMPTS: u32 = 5;

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    session_ttl_seconds: i64,
    persistent_session_ttl_seconds: i64,
    pending_mfa_ttl_seconds: i64,
    mfa_max_failed_attempts: u32,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            persistent_session_ttl_seconds: DEFAULT_PERSISTENT_SESSION_TTL_SECONDS,
            pending_mfa_ttl_seconds: DEFAULT_PENDING_MFA_TTL_SECONDS,
            mfa_max_failed_attempts: DEFAULT_MFA_MAX_FAILED_ATTEMPTS,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_persistent_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.persistent_session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_pending_mfa_ttl_seconds(mut self, seconds: i64) -> Self {
        self.pending_mfa_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_mfa_max_failed_attempts(mut self, attempts: u32) -> Self {
        self.mfa_max_failed_attempts = attempts.max(1);
        self
    }

    pub(crate) fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    #[must_use]
    pub fn persistent_session_ttl_seconds(&self) -> i64 {
        self.persistent_session_ttl_seconds
    }

    #[must_use]
    pub fn pending_mfa_ttl_seconds(&self) -> i64 {
        self.pending_mfa_ttl_seconds
    }

    #[must_use]
    pub fn mfa_max_failed_attempts(&self) -> u32 {
        self.mfa_max_failed_attempts
    }

    #[must_use]
    pub fn session_ttls(&self) -> SessionTtls {
        SessionTtls {
            standard_seconds: self.session_ttl_seconds,
            persistent_seconds: self.persistent_session_ttl_seconds,
        }
    }

    pub(super) fn session_cookie_secure(&self) -> bool {
        self.frontend_base_url.starts_with("https://")
    }
}

pub struct AuthState {
    config: AuthConfig,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        Self {
            config,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::{NoopRateLimiter, RateLimiter};
    use super::{AuthConfig, AuthState};
    use std::sync::Arc;

    #[test]
    fn auth_config_defaults_and_overrides() {
        let config = AuthConfig::new("https://gardisto.dev".to_string());

        assert_eq!(config.frontend_base_url(), "https://gardisto.dev");
        assert_eq!(
            config.session_ttl_seconds(),
            super::DEFAULT_SESSION_TTL_SECONDS
        );
        assert_eq!(
            config.persistent_session_ttl_seconds(),
            super::DEFAULT_PERSISTENT_SESSION_TTL_SECONDS
        );
        assert_eq!(
            config.pending_mfa_ttl_seconds(),
            super::DEFAULT_PENDING_MFA_TTL_SECONDS
        );
        assert!(config.session_cookie_secure());

        let config = config
            .with_session_ttl_seconds(3600)
            .with_persistent_session_ttl_seconds(7200)
            .with_pending_mfa_ttl_seconds(120)
            .with_mfa_max_failed_attempts(3);

        assert_eq!(config.session_ttl_seconds(), 3600);
        assert_eq!(config.persistent_session_ttl_seconds(), 7200);
        assert_eq!(config.pending_mfa_ttl_seconds(), 120);
        assert_eq!(config.mfa_max_failed_attempts(), 3);
        assert_eq!(config.session_ttls().standard_seconds, 3600);
        assert_eq!(config.session_ttls().persistent_seconds, 7200);
    }

    #[test]
    fn plain_http_frontend_disables_secure_cookies() {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        assert!(!config.session_cookie_secure());
    }

    #[test]
    fn auth_state_constructs_with_noop_rate_limiter() {
        let config = AuthConfig::new("https://gardisto.dev".to_string());
        let limiter: Arc<dyn RateLimiter> = Arc::new(NoopRateLimiter);
        let state = AuthState::new(config, limiter);
        assert!(state.config().session_cookie_secure());
    }
}
