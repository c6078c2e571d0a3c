//! Append-only audit trail for security-relevant events.
//!
//! Audit entries are a side channel for observability and compliance; no
//! control flow reads them back. Writes are best-effort: a failed insert is
//! surfaced to operational logging and the triggering operation proceeds.

pub mod repo;

use sqlx::PgPool;
use tracing::error;
use uuid::Uuid;

/// A single security event, captured at the point of transition.
///
/// Entries are immutable once written. The timestamp is assigned by the
/// database in UTC.
#[derive(Debug, Clone)]
pub struct AuditEvent<'a> {
    pub user_id: Uuid,
    pub user_name: &'a str,
    pub action: &'a str,
    pub context: &'a str,
    pub request_path: &'a str,
    pub client_ip: Option<&'a str>,
}

/// Write-side of the audit trail.
#[derive(Clone)]
pub struct AuditLog {
    pool: PgPool,
}

impl AuditLog {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an event. Never fails the caller; insert errors are logged.
    pub async fn record(&self, event: AuditEvent<'_>) {
        if let Err(err) = repo::insert_entry(&self.pool, &event).await {
            error!(
                user_id = %event.user_id,
                action = %event.action,
                "audit write failed: {err}"
            );
        }
    }
}
