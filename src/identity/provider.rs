//! Credential checks, profile counter updates, and session persistence.

use anyhow::{Context, Result};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::models::{LoginRecord, SecurityProfile, SessionRecord};

const PROFILE_COLUMNS: &str = "id, email, display_name, require_mfa, \
     force_mfa_after_failed_attempts, failed_login_count, last_failed_login_at, created_at";

/// Outcome when attempting to create a new account.
#[derive(Debug)]
pub enum SignupOutcome {
    Created(SecurityProfile),
    Conflict,
}

/// Credential authority over the user store.
///
/// Stateless apart from the pool; safe to clone into handlers and share
/// across concurrent requests.
#[derive(Clone)]
pub struct CredentialProvider {
    pool: PgPool,
}

impl CredentialProvider {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up login data by normalized email.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<LoginRecord>> {
        let query = format!("SELECT {PROFILE_COLUMNS}, password_hash FROM users WHERE email = $1");
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );
        sqlx::query_as::<_, LoginRecord>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup login record")
    }

    /// Look up a security profile by user id.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, user_id: Uuid) -> Result<Option<SecurityProfile>> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, SecurityProfile>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to lookup security profile")
    }

    /// Verify a submitted password against the stored Argon2id hash.
    ///
    /// # Errors
    /// Returns an error if the stored hash cannot be parsed.
    pub fn verify_password(record: &LoginRecord, password: &SecretString) -> Result<bool> {
        let parsed = PasswordHash::new(&record.password_hash)
            .map_err(|_| anyhow::anyhow!("invalid stored password hash"))?;
        Ok(Argon2::default()
            .verify_password(password.expose_secret().as_bytes(), &parsed)
            .is_ok())
    }

    /// Hash a password for storage using Argon2id with default parameters.
    ///
    /// # Errors
    /// Returns an error if hashing fails.
    pub fn hash_password(password: &SecretString) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.expose_secret().as_bytes(), &salt)
            .map_err(|_| anyhow::anyhow!("failed to hash password"))?
            .to_string();
        Ok(hash)
    }

    /// Create a new account, mapping duplicate emails to a conflict outcome.
    ///
    /// # Errors
    /// Returns an error if the insert fails for any reason other than a
    /// unique violation.
    pub async fn create_user(
        &self,
        email: &str,
        display_name: Option<&str>,
        password_hash: &str,
    ) -> Result<SignupOutcome> {
        let query = format!(
            "INSERT INTO users (email, display_name, password_hash) \
             VALUES ($1, $2, $3) \
             RETURNING {PROFILE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, SecurityProfile>(&query)
            .bind(email)
            .bind(display_name)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await;

        match row {
            Ok(profile) => Ok(SignupOutcome::Created(profile)),
            Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
            Err(err) => Err(err).context("failed to insert user"),
        }
    }

    /// Increment the consecutive-failure counter and stamp the failure time.
    ///
    /// Single-statement read-modify-write so concurrent wrong-password
    /// submissions serialize at the row level. Returns the new count.
    ///
    /// # Errors
    /// Returns an error if the update fails or the user vanished.
    pub async fn record_failed_login(&self, user_id: Uuid) -> Result<i32> {
        let query = r"
            UPDATE users
            SET failed_login_count = failed_login_count + 1,
                last_failed_login_at = NOW()
            WHERE id = $1
            RETURNING failed_login_count
        ";
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .context("failed to record failed login")?;
        Ok(row.get("failed_login_count"))
    }

    /// Reset the failure counter after a successful login or MFA completion.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn reset_failed_logins(&self, user_id: Uuid) -> Result<()> {
        let query = r"
            UPDATE users
            SET failed_login_count = 0,
                last_failed_login_at = NULL
            WHERE id = $1
              AND failed_login_count > 0
        ";
        sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("failed to reset failed logins")?;
        Ok(())
    }

    /// Stamp a failed MFA submission. The consecutive-failure counter is not
    /// touched here; only wrong passwords increment it.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn record_failed_mfa(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET last_failed_login_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("failed to record failed MFA attempt")?;
        Ok(())
    }

    /// Create a server-side session and return the raw token for the cookie.
    /// The database stores only a hash of the token.
    ///
    /// # Errors
    /// Returns an error if token generation fails or the insert keeps
    /// colliding.
    pub async fn create_session(
        &self,
        user_id: Uuid,
        persistent: bool,
        ttl_seconds: i64,
    ) -> Result<String> {
        let query = r"
            INSERT INTO user_sessions (user_id, session_hash, persistent, expires_at)
            VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
        ";

        for _ in 0..3 {
            let token = generate_session_token()?;
            let token_hash = hash_session_token(&token);
            let result = sqlx::query(query)
                .bind(user_id)
                .bind(&token_hash)
                .bind(persistent)
                .bind(ttl_seconds)
                .execute(&self.pool)
                .await;
            match result {
                Ok(_) => return Ok(token),
                Err(err) if is_unique_violation(&err) => continue,
                Err(err) => return Err(err).context("failed to insert session"),
            }
        }

        Err(anyhow::anyhow!("session token collision retry exhausted"))
    }

    /// Resolve a session-token hash into the owning identity, if unexpired.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn lookup_session(&self, token_hash: &[u8]) -> Result<Option<SessionRecord>> {
        let query = r"
            SELECT u.id, u.email, u.display_name
            FROM user_sessions s
            JOIN users u ON u.id = s.user_id
            WHERE s.session_hash = $1
              AND s.expires_at > NOW()
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup session")?;

        Ok(row.map(|row| SessionRecord {
            user_id: row.get("id"),
            email: row.get("email"),
            display_name: row.get("display_name"),
        }))
    }

    /// Delete a session by token hash; missing rows are not an error.
    ///
    /// # Errors
    /// Returns an error if the delete fails.
    pub async fn delete_session(&self, token_hash: &[u8]) -> Result<()> {
        sqlx::query("DELETE FROM user_sessions WHERE session_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .context("failed to delete session")?;
        Ok(())
    }
}

/// Create a new session token for the auth cookie.
/// The raw value is only returned to set the cookie; the database stores a hash.
pub(crate) fn generate_session_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a session token so raw values never touch the database.
pub(crate) fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::identity::models::SecurityProfile;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use chrono::Utc;

    fn record(password_hash: String) -> LoginRecord {
        LoginRecord {
            profile: SecurityProfile {
                user_id: Uuid::new_v4(),
                email: "alice@example.com".to_string(),
                display_name: None,
                require_mfa: false,
                force_mfa_after_failed_attempts: true,
                failed_login_count: 0,
                last_failed_login_at: None,
                created_at: Utc::now(),
            },
            password_hash,
        }
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let password = SecretString::from("correct horse battery staple".to_string());
        let hash = CredentialProvider::hash_password(&password).unwrap();
        let record = record(hash);
        assert!(CredentialProvider::verify_password(&record, &password).unwrap());

        let wrong = SecretString::from("hunter2".to_string());
        assert!(!CredentialProvider::verify_password(&record, &wrong).unwrap());
    }

    #[test]
    fn verify_password_rejects_malformed_hash() {
        let record = record("not-a-phc-string".to_string());
        let password = SecretString::from("anything".to_string());
        assert!(CredentialProvider::verify_password(&record, &password).is_err());
    }

    #[test]
    fn generate_session_token_round_trip() {
        let decoded_len = generate_session_token()
            .ok()
            .and_then(|token| URL_SAFE_NO_PAD.decode(token.as_bytes()).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn hash_session_token_stable() {
        let first = hash_session_token("token");
        let second = hash_session_token("token");
        let different = hash_session_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
    }
}
