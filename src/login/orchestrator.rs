//! The login state machine.

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditLog};
use crate::email::Notifier;
use crate::identity::{CredentialProvider, SecurityProfile, SignupOutcome};
use crate::identity::provider::hash_session_token;
use crate::login::outcome::{LoginOutcome, MfaReason, RegisterOutcome};
use crate::login::pending::{PendingLogin, PendingMfaStore};
use crate::mfa::MfaService;

const DEFAULT_REDIRECT: &str = "/";

/// Session lifetimes for browser-scoped vs. remember-me sessions.
#[derive(Clone, Copy, Debug)]
pub struct SessionTtls {
    pub standard_seconds: i64,
    pub persistent_seconds: i64,
}

/// Request-scoped facts recorded into the audit trail.
#[derive(Clone, Debug)]
pub struct RequestContext {
    /// Originating operation label, e.g. `auth/login`.
    pub context: &'static str,
    pub request_path: String,
    pub client_ip: Option<String>,
}

/// Drives a login attempt from credential check through optional MFA to
/// session establishment.
///
/// Stateless apart from the shared stores; safe to clone and run as many
/// concurrent instances. Counter updates are single-statement
/// read-modify-writes, and token validation is atomic in the store, so
/// concurrent submissions for the same user stay correct.
#[derive(Clone)]
pub struct LoginOrchestrator {
    provider: CredentialProvider,
    mfa: MfaService,
    audit: AuditLog,
    notifier: Notifier,
    pending: Arc<PendingMfaStore>,
    ttls: SessionTtls,
}

impl LoginOrchestrator {
    #[must_use]
    pub fn new(
        provider: CredentialProvider,
        mfa: MfaService,
        audit: AuditLog,
        notifier: Notifier,
        pending: Arc<PendingMfaStore>,
        ttls: SessionTtls,
    ) -> Self {
        Self {
            provider,
            mfa,
            audit,
            notifier,
            pending,
            ttls,
        }
    }

    /// Check credentials and either finish the login, park it behind MFA, or
    /// reject it.
    ///
    /// Unknown emails return the same generic outcome as wrong passwords and
    /// leave no trace: no audit row, no counter change.
    ///
    /// # Errors
    /// Returns an error on store failures; user-visible failures are
    /// expressed as [`LoginOutcome`] variants instead.
    pub async fn attempt_login(
        &self,
        email: &str,
        password: &SecretString,
        remember_me: bool,
        return_to: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<LoginOutcome> {
        let Some(record) = self.provider.find_by_email(email).await? else {
            return Ok(LoginOutcome::InvalidCredentials {
                remaining_attempts: None,
            });
        };

        if CredentialProvider::verify_password(&record, password)? {
            self.provider
                .reset_failed_logins(record.profile.user_id)
                .await?;
            let mut profile = record.profile;
            profile.failed_login_count = 0;
            profile.last_failed_login_at = None;

            if self.mfa.config().requires_mfa(&profile) {
                return self
                    .begin_mfa(&profile, remember_me, return_to, MfaReason::PolicyOptIn, ctx)
                    .await;
            }

            let (session_token, session_ttl_seconds) =
                self.finalize_session(&profile, remember_me).await?;
            self.record_audit(&profile, "Login Success", ctx).await;
            info!(user_id = %profile.user_id, "login succeeded");

            return Ok(LoginOutcome::Authenticated {
                session_token,
                session_ttl_seconds,
                redirect_to: safe_redirect_target(return_to),
            });
        }

        let failed_count = self
            .provider
            .record_failed_login(record.profile.user_id)
            .await?;
        let mut profile = record.profile;
        profile.failed_login_count = failed_count;

        let action = format!("Login Failed - Attempt {failed_count}");
        self.record_audit(&profile, &action, ctx).await;

        if self.mfa.config().requires_mfa(&profile)
            && failed_count >= self.mfa.config().escalation_threshold()
        {
            return self
                .begin_mfa(
                    &profile,
                    remember_me,
                    return_to,
                    MfaReason::TooManyFailures,
                    ctx,
                )
                .await;
        }

        Ok(LoginOutcome::InvalidCredentials {
            remaining_attempts: self.mfa.config().remaining_attempts_warning(failed_count),
        })
    }

    /// Complete a parked login with a submitted one-time code.
    ///
    /// A wrong code retains the pending session for retry (up to the store's
    /// failure cap); only wrong passwords increment the failure counter.
    ///
    /// # Errors
    /// Returns an error on store failures.
    pub async fn complete_mfa(
        &self,
        pending_id: Option<Uuid>,
        code: &str,
        ctx: &RequestContext,
    ) -> Result<LoginOutcome> {
        let Some(pending_id) = pending_id else {
            return Ok(LoginOutcome::SessionExpired);
        };
        let Some(pending) = self.pending.get(pending_id).await else {
            return Ok(LoginOutcome::SessionExpired);
        };
        let Some(profile) = self.provider.find_by_id(pending.user_id).await? else {
            // Account vanished mid-flow; drop the continuation.
            self.pending.consume(pending_id).await;
            return Ok(LoginOutcome::SessionExpired);
        };

        if self.mfa.validate_token(profile.user_id, code).await? {
            self.pending.consume(pending_id).await;
            self.provider.reset_failed_logins(profile.user_id).await?;

            let (session_token, session_ttl_seconds) =
                self.finalize_session(&profile, pending.remember_me).await?;
            self.record_audit(&profile, "Login with MFA Success", ctx).await;
            self.notifier.send_security_alert(
                &profile.email,
                "Login with MFA Success",
                profile.display_label(),
            );
            info!(user_id = %profile.user_id, "login with MFA succeeded");

            return Ok(LoginOutcome::Authenticated {
                session_token,
                session_ttl_seconds,
                redirect_to: safe_redirect_target(pending.return_to.as_deref()),
            });
        }

        self.provider.record_failed_mfa(profile.user_id).await?;
        self.record_audit(&profile, "MFA Failed - Invalid Token", ctx)
            .await;
        self.pending.record_failure(pending_id).await;

        Ok(LoginOutcome::MfaInvalid)
    }

    /// Create a new account and sign it in.
    ///
    /// # Errors
    /// Returns an error if hashing or the store fails.
    pub async fn register(
        &self,
        email: &str,
        display_name: Option<&str>,
        password: &SecretString,
        ctx: &RequestContext,
    ) -> Result<RegisterOutcome> {
        let password_hash = CredentialProvider::hash_password(password)?;
        match self
            .provider
            .create_user(email, display_name, &password_hash)
            .await?
        {
            SignupOutcome::Created(profile) => {
                self.record_audit(&profile, "Register Success", ctx).await;
                let (session_token, session_ttl_seconds) =
                    self.finalize_session(&profile, false).await?;
                Ok(RegisterOutcome::Created {
                    session_token,
                    session_ttl_seconds,
                })
            }
            SignupOutcome::Conflict => Ok(RegisterOutcome::Conflict),
        }
    }

    /// Terminate the session behind the given raw token, auditing the logout
    /// for the owning identity. No-op when anonymous.
    ///
    /// # Errors
    /// Returns an error if the session store fails.
    pub async fn logout(&self, session_token: Option<&str>, ctx: &RequestContext) -> Result<()> {
        let Some(token) = session_token else {
            return Ok(());
        };
        let token_hash = hash_session_token(token);

        if let Some(session) = self.provider.lookup_session(&token_hash).await? {
            let user_name = session
                .display_name
                .clone()
                .unwrap_or_else(|| session.email.clone());
            self.audit
                .record(AuditEvent {
                    user_id: session.user_id,
                    user_name: &user_name,
                    action: "Logout",
                    context: ctx.context,
                    request_path: &ctx.request_path,
                    client_ip: ctx.client_ip.as_deref(),
                })
                .await;
        }

        self.provider
            .delete_session(&token_hash)
            .await
            .context("failed to terminate session")
    }

    async fn begin_mfa(
        &self,
        profile: &SecurityProfile,
        remember_me: bool,
        return_to: Option<&str>,
        reason: MfaReason,
        ctx: &RequestContext,
    ) -> Result<LoginOutcome> {
        let pending_id = self
            .pending
            .create(PendingLogin {
                user_id: profile.user_id,
                remember_me,
                return_to: return_to.map(str::to_string),
            })
            .await;

        // Token delivery is fire-and-forget; if the email never arrives the
        // user restarts login and a fresh code supersedes this one.
        self.mfa.issue_token(profile).await?;

        let action = match reason {
            MfaReason::PolicyOptIn => "MFA Required - Token Sent",
            MfaReason::TooManyFailures => "MFA Required - Too many failed attempts",
        };
        self.record_audit(profile, action, ctx).await;

        Ok(LoginOutcome::MfaRequired { pending_id, reason })
    }

    async fn finalize_session(
        &self,
        profile: &SecurityProfile,
        persistent: bool,
    ) -> Result<(String, i64)> {
        let ttl_seconds = if persistent {
            self.ttls.persistent_seconds
        } else {
            self.ttls.standard_seconds
        };
        let token = self
            .provider
            .create_session(profile.user_id, persistent, ttl_seconds)
            .await?;
        Ok((token, ttl_seconds))
    }

    async fn record_audit(&self, profile: &SecurityProfile, action: &str, ctx: &RequestContext) {
        self.audit
            .record(AuditEvent {
                user_id: profile.user_id,
                user_name: profile.display_label(),
                action,
                context: ctx.context,
                request_path: &ctx.request_path,
                client_ip: ctx.client_ip.as_deref(),
            })
            .await;
    }
}

/// Re-validate a client-supplied destination as a local path.
///
/// Anything that is not a same-site absolute path (`/...`, not `//...`)
/// falls back to the default destination.
#[must_use]
pub fn safe_redirect_target(destination: Option<&str>) -> String {
    let Some(destination) = destination.map(str::trim).filter(|d| !d.is_empty()) else {
        return DEFAULT_REDIRECT.to_string();
    };
    let local = destination.starts_with('/')
        && !destination.starts_with("//")
        && !destination.starts_with("/\\");
    if local {
        destination.to_string()
    } else {
        DEFAULT_REDIRECT.to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::safe_redirect_target;
    use crate::login::outcome::MfaReason;
    use crate::mfa::MfaConfig;
    use std::collections::HashMap;

    #[test]
    fn safe_redirect_accepts_local_paths() {
        assert_eq!(safe_redirect_target(Some("/dashboard")), "/dashboard");
        assert_eq!(safe_redirect_target(Some("/a/b?c=d")), "/a/b?c=d");
    }

    #[test]
    fn safe_redirect_rejects_external_targets() {
        assert_eq!(safe_redirect_target(Some("https://evil.example")), "/");
        assert_eq!(safe_redirect_target(Some("//evil.example")), "/");
        assert_eq!(safe_redirect_target(Some("/\\evil.example")), "/");
        assert_eq!(safe_redirect_target(Some("javascript:alert(1)")), "/");
    }

    #[test]
    fn safe_redirect_defaults_when_absent() {
        assert_eq!(safe_redirect_target(None), "/");
        assert_eq!(safe_redirect_target(Some("  ")), "/");
    }

    // In-memory mirror of the orchestrator's decision flow over the same
    // policy object, exercising the counter/escalation state machine
    // without a database.
    #[derive(Debug, PartialEq)]
    enum Step {
        Authenticated,
        MfaRequired(MfaReason),
        InvalidCredentials(Option<i32>),
        MfaInvalid,
        SessionExpired,
    }

    struct Account {
        password: String,
        require_mfa: bool,
        force_mfa_after_failed_attempts: bool,
        failed_login_count: i32,
    }

    struct InMemoryGateway {
        config: MfaConfig,
        accounts: HashMap<String, Account>,
        pending: Option<(String, String)>, // (email, code)
        audit: Vec<String>,
    }

    impl InMemoryGateway {
        fn new() -> Self {
            Self {
                config: MfaConfig::new(),
                accounts: HashMap::new(),
                pending: None,
                audit: Vec::new(),
            }
        }

        fn add_account(&mut self, email: &str, account: Account) {
            self.accounts.insert(email.to_string(), account);
        }

        fn requires_mfa(&self, account: &Account) -> bool {
            account.require_mfa
                || (account.force_mfa_after_failed_attempts
                    && account.failed_login_count >= self.config.escalation_threshold())
        }

        fn attempt_login(&mut self, email: &str, password: &str) -> Step {
            let Some(account) = self.accounts.get(email) else {
                return Step::InvalidCredentials(None);
            };

            if account.password == password {
                let account = self.accounts.get_mut(email).unwrap();
                account.failed_login_count = 0;
                let requires = account.require_mfa;
                if requires {
                    self.pending = Some((email.to_string(), "123456".to_string()));
                    self.audit.push("MFA Required - Token Sent".to_string());
                    return Step::MfaRequired(MfaReason::PolicyOptIn);
                }
                self.audit.push("Login Success".to_string());
                return Step::Authenticated;
            }

            let account = self.accounts.get_mut(email).unwrap();
            account.failed_login_count += 1;
            let count = account.failed_login_count;
            self.audit.push(format!("Login Failed - Attempt {count}"));

            let account = self.accounts.get(email).unwrap();
            if self.requires_mfa(account) && count >= self.config.escalation_threshold() {
                self.pending = Some((email.to_string(), "123456".to_string()));
                self.audit
                    .push("MFA Required - Too many failed attempts".to_string());
                return Step::MfaRequired(MfaReason::TooManyFailures);
            }

            Step::InvalidCredentials(self.config.remaining_attempts_warning(count))
        }

        fn complete_mfa(&mut self, code: &str) -> Step {
            let Some((email, expected)) = self.pending.clone() else {
                return Step::SessionExpired;
            };
            if code == expected {
                self.pending = None;
                let account = self.accounts.get_mut(&email).unwrap();
                account.failed_login_count = 0;
                self.audit.push("Login with MFA Success".to_string());
                return Step::Authenticated;
            }
            self.audit.push("MFA Failed - Invalid Token".to_string());
            Step::MfaInvalid
        }
    }

    fn escalating_account(password: &str, failures: i32) -> Account {
        Account {
            password: password.to_string(),
            require_mfa: false,
            force_mfa_after_failed_attempts: true,
            failed_login_count: failures,
        }
    }

    #[test]
    fn fifth_consecutive_failure_escalates() {
        let mut gateway = InMemoryGateway::new();
        gateway.add_account("alice@example.com", escalating_account("secret", 0));

        for attempt in 1..=4 {
            let step = gateway.attempt_login("alice@example.com", "wrong");
            let expected = gateway.config.remaining_attempts_warning(attempt);
            assert_eq!(step, Step::InvalidCredentials(expected));
        }

        let step = gateway.attempt_login("alice@example.com", "wrong");
        assert_eq!(step, Step::MfaRequired(MfaReason::TooManyFailures));
        assert!(gateway
            .audit
            .contains(&"MFA Required - Too many failed attempts".to_string()));
    }

    #[test]
    fn warning_shown_only_on_attempts_two_through_four() {
        let mut gateway = InMemoryGateway::new();
        gateway.add_account("alice@example.com", escalating_account("secret", 0));

        assert_eq!(
            gateway.attempt_login("alice@example.com", "wrong"),
            Step::InvalidCredentials(None)
        );
        assert_eq!(
            gateway.attempt_login("alice@example.com", "wrong"),
            Step::InvalidCredentials(Some(3))
        );
        assert_eq!(
            gateway.attempt_login("alice@example.com", "wrong"),
            Step::InvalidCredentials(Some(2))
        );
        assert_eq!(
            gateway.attempt_login("alice@example.com", "wrong"),
            Step::InvalidCredentials(Some(1))
        );
    }

    #[test]
    fn fourth_failure_then_wrong_password_escalates_at_five() {
        let mut gateway = InMemoryGateway::new();
        gateway.add_account("alice@example.com", escalating_account("secret", 4));

        let step = gateway.attempt_login("alice@example.com", "wrong");
        assert_eq!(step, Step::MfaRequired(MfaReason::TooManyFailures));
        assert_eq!(
            gateway
                .accounts
                .get("alice@example.com")
                .unwrap()
                .failed_login_count,
            5
        );
    }

    #[test]
    fn success_resets_counter() {
        let mut gateway = InMemoryGateway::new();
        gateway.add_account("alice@example.com", escalating_account("secret", 3));

        assert_eq!(
            gateway.attempt_login("alice@example.com", "secret"),
            Step::Authenticated
        );
        assert_eq!(
            gateway
                .accounts
                .get("alice@example.com")
                .unwrap()
                .failed_login_count,
            0
        );
    }

    #[test]
    fn opt_in_user_parks_behind_mfa_on_correct_password() {
        let mut gateway = InMemoryGateway::new();
        gateway.add_account(
            "bob@example.com",
            Account {
                password: "secret".to_string(),
                require_mfa: true,
                force_mfa_after_failed_attempts: false,
                failed_login_count: 0,
            },
        );

        assert_eq!(
            gateway.attempt_login("bob@example.com", "secret"),
            Step::MfaRequired(MfaReason::PolicyOptIn)
        );
    }

    #[test]
    fn unknown_email_is_generic_and_leaves_no_trace() {
        let mut gateway = InMemoryGateway::new();
        assert_eq!(
            gateway.attempt_login("ghost@example.com", "whatever"),
            Step::InvalidCredentials(None)
        );
        assert!(gateway.audit.is_empty());
    }

    #[test]
    fn mfa_completion_resets_counter_and_clears_pending() {
        let mut gateway = InMemoryGateway::new();
        gateway.add_account("alice@example.com", escalating_account("secret", 4));
        gateway.attempt_login("alice@example.com", "wrong");

        assert_eq!(gateway.complete_mfa("123456"), Step::Authenticated);
        assert_eq!(
            gateway
                .accounts
                .get("alice@example.com")
                .unwrap()
                .failed_login_count,
            0
        );
        assert_eq!(gateway.complete_mfa("123456"), Step::SessionExpired);
    }

    #[test]
    fn wrong_code_retains_pending_session() {
        let mut gateway = InMemoryGateway::new();
        gateway.add_account("alice@example.com", escalating_account("secret", 4));
        gateway.attempt_login("alice@example.com", "wrong");

        assert_eq!(gateway.complete_mfa("000000"), Step::MfaInvalid);
        assert_eq!(gateway.complete_mfa("123456"), Step::Authenticated);
    }

    #[test]
    fn code_without_pending_session_is_expired() {
        let mut gateway = InMemoryGateway::new();
        assert_eq!(gateway.complete_mfa("123456"), Step::SessionExpired);
    }
}
