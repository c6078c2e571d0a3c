use anyhow::{Context, Result};
use rand::{Rng, rngs::OsRng};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::email::Notifier;
use crate::identity::SecurityProfile;
use crate::mfa::{MfaConfig, repo::MfaTokenRepo};

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

#[derive(Clone)]
pub struct MfaService {
    pool: PgPool,
    config: MfaConfig,
    notifier: Notifier,
}

impl MfaService {
    #[must_use]
    pub fn new(pool: PgPool, config: MfaConfig, notifier: Notifier) -> Self {
        Self {
            pool,
            config,
            notifier,
        }
    }

    #[must_use]
    pub fn config(&self) -> &MfaConfig {
        &self.config
    }

    /// Issue a fresh one-time code for the user and dispatch it.
    ///
    /// Any outstanding unused code is invalidated first. Delivery is
    /// fire-and-forget; a send failure leaves the token valid so the user
    /// can request a fresh one rather than being blocked.
    ///
    /// # Errors
    /// Returns an error if code generation or persistence fails.
    pub async fn issue_token(&self, profile: &SecurityProfile) -> Result<()> {
        let code = generate_code();
        let token_id = Uuid::new_v4();

        MfaTokenRepo::replace_token(
            &self.pool,
            token_id,
            profile.user_id,
            &hash_code(&code),
            self.config.token_ttl_seconds(),
        )
        .await
        .context("failed to persist MFA token")?;

        self.notifier
            .send_token(&profile.email, &code, profile.display_label());

        Ok(())
    }

    /// Validate a submitted code against the user's outstanding token.
    ///
    /// On a match the token is spent atomically with the lookup; expired or
    /// already-used codes fail permanently without mutation.
    ///
    /// # Errors
    /// Returns an error if the database update fails.
    pub async fn validate_token(&self, user_id: Uuid, submitted: &str) -> Result<bool> {
        let submitted = submitted.trim();
        if !is_code_shape(submitted) {
            return Ok(false);
        }
        MfaTokenRepo::consume_token(&self.pool, user_id, &hash_code(submitted)).await
    }
}

/// Generate a uniformly random six-digit code from the OS CSPRNG.
fn generate_code() -> String {
    OsRng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

/// Shape check before hashing: exactly six ASCII digits.
fn is_code_shape(submitted: &str) -> bool {
    submitted.len() == 6 && submitted.bytes().all(|b| b.is_ascii_digit())
}

/// Hash a code so raw values never touch the database.
fn hash_code(code: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::{Duration, Instant};

    #[test]
    fn generated_codes_are_six_digits_in_range() {
        for _ in 0..256 {
            let code = generate_code();
            assert!(is_code_shape(&code));
            let value: u32 = code.parse().unwrap();
            assert!((CODE_MIN..=CODE_MAX).contains(&value));
        }
    }

    #[test]
    fn code_shape_rejects_padding_and_words() {
        assert!(is_code_shape("123456"));
        assert!(!is_code_shape("12345"));
        assert!(!is_code_shape("1234567"));
        assert!(!is_code_shape("12345a"));
        assert!(!is_code_shape(""));
    }

    #[test]
    fn hash_code_stable_and_distinct() {
        assert_eq!(hash_code("123456"), hash_code("123456"));
        assert_ne!(hash_code("123456"), hash_code("654321"));
    }

    // In-memory mirror of the token store semantics: replace-on-issue,
    // atomic single-use consumption, time-bounded validity.
    struct InMemoryTokenStore {
        ttl: Duration,
        tokens: HashMap<Uuid, (Vec<u8>, bool, Instant)>,
    }

    impl InMemoryTokenStore {
        fn new(ttl: Duration) -> Self {
            Self {
                ttl,
                tokens: HashMap::new(),
            }
        }

        fn issue(&mut self, user_id: Uuid) -> String {
            let code = generate_code();
            self.tokens
                .insert(user_id, (hash_code(&code), false, Instant::now()));
            code
        }

        fn consume(&mut self, user_id: Uuid, submitted: &str) -> bool {
            if !is_code_shape(submitted.trim()) {
                return false;
            }
            let Some((hash, used, issued_at)) = self.tokens.get_mut(&user_id) else {
                return false;
            };
            if *used || issued_at.elapsed() >= self.ttl || *hash != hash_code(submitted.trim()) {
                return false;
            }
            *used = true;
            true
        }
    }

    #[test]
    fn token_is_single_use() {
        let mut store = InMemoryTokenStore::new(Duration::from_secs(600));
        let user = Uuid::new_v4();
        let code = store.issue(user);
        assert!(store.consume(user, &code));
        assert!(!store.consume(user, &code));
    }

    #[test]
    fn new_issue_invalidates_prior_token() {
        let mut store = InMemoryTokenStore::new(Duration::from_secs(600));
        let user = Uuid::new_v4();
        let first = store.issue(user);
        let second = store.issue(user);
        if first != second {
            assert!(!store.consume(user, &first));
        }
        assert!(store.consume(user, &second));
    }

    #[test]
    fn expired_token_fails_even_with_correct_digits() {
        let mut store = InMemoryTokenStore::new(Duration::ZERO);
        let user = Uuid::new_v4();
        let code = store.issue(user);
        assert!(!store.consume(user, &code));
    }

    #[test]
    fn wrong_user_cannot_spend_token() {
        let mut store = InMemoryTokenStore::new(Duration::from_secs(600));
        let user = Uuid::new_v4();
        let code = store.issue(user);
        assert!(!store.consume(Uuid::new_v4(), &code));
        assert!(store.consume(user, &code));
    }
}
