use chrono::{DateTime, Utc};
use sqlx::{FromRow, Row, postgres::PgRow};
use uuid::Uuid;

/// Security-relevant subset of a user row.
///
/// `failed_login_count` is reset to zero exactly on successful password-only
/// login or successful MFA completion, and incremented by one on each wrong
/// password. The MFA policy flags are set by admin/policy tooling and never
/// written by the login flow.
#[derive(Debug, Clone)]
pub struct SecurityProfile {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub require_mfa: bool,
    pub force_mfa_after_failed_attempts: bool,
    pub failed_login_count: i32,
    pub last_failed_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SecurityProfile {
    /// Name used in audit entries and outbound email.
    #[must_use]
    pub fn display_label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

impl<'r> FromRow<'r, PgRow> for SecurityProfile {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            require_mfa: row.try_get("require_mfa")?,
            force_mfa_after_failed_attempts: row.try_get("force_mfa_after_failed_attempts")?,
            failed_login_count: row.try_get("failed_login_count")?,
            last_failed_login_at: row.try_get("last_failed_login_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Profile plus the stored password hash, used only during credential checks.
#[derive(Debug, Clone)]
pub struct LoginRecord {
    pub profile: SecurityProfile,
    pub password_hash: String,
}

impl<'r> FromRow<'r, PgRow> for LoginRecord {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            profile: SecurityProfile::from_row(row)?,
            password_hash: row.try_get("password_hash")?,
        })
    }
}

/// Minimal data resolved from a valid session cookie.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn profile(display_name: Option<&str>) -> SecurityProfile {
        SecurityProfile {
            user_id: Uuid::new_v4(),
            email: "alice@example.com".to_string(),
            display_name: display_name.map(str::to_string),
            require_mfa: false,
            force_mfa_after_failed_attempts: true,
            failed_login_count: 0,
            last_failed_login_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn display_label_prefers_display_name() {
        assert_eq!(profile(Some("Alice")).display_label(), "Alice");
    }

    #[test]
    fn display_label_falls_back_to_email() {
        assert_eq!(profile(None).display_label(), "alice@example.com");
    }
}
