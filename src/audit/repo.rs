use anyhow::{Context, Result};
use sqlx::PgPool;

use super::AuditEvent;

/// Insert one audit entry.
///
/// # Errors
/// Returns an error if the database insertion fails.
pub async fn insert_entry(pool: &PgPool, event: &AuditEvent<'_>) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO audit_log (user_id, user_name, action, context, request_path, ip_address)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(event.user_id)
    .bind(event.user_name)
    .bind(event.action)
    .bind(event.context)
    .bind(event.request_path)
    .bind(event.client_ip)
    .execute(pool)
    .await
    .context("failed to write audit entry")?;
    Ok(())
}
