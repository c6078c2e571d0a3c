use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

pub struct MfaTokenRepo;

impl MfaTokenRepo {
    /// Persist a fresh token, invalidating all prior unused tokens for the
    /// user in the same transaction.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn replace_token(
        pool: &PgPool,
        token_id: Uuid,
        user_id: Uuid,
        token_hash: &[u8],
        ttl_seconds: i64,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;

        // A new issuance supersedes anything still outstanding.
        sqlx::query("DELETE FROM mfa_tokens WHERE user_id = $1 AND is_used = FALSE")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r"
            INSERT INTO mfa_tokens (id, user_id, token_hash, expires_at)
            VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
            ",
        )
        .bind(token_id)
        .bind(user_id)
        .bind(token_hash)
        .bind(ttl_seconds)
        .execute(&mut *tx)
        .await
        .context("failed to insert MFA token")?;

        tx.commit().await?;

        Ok(())
    }

    /// Atomically spend a matching unused, unexpired token.
    ///
    /// The check and the `is_used` flip are a single conditional update, so
    /// at most one of any number of concurrent submissions can succeed.
    ///
    /// # Errors
    /// Returns an error if the database update fails.
    pub async fn consume_token(pool: &PgPool, user_id: Uuid, token_hash: &[u8]) -> Result<bool> {
        let row = sqlx::query(
            r"
            UPDATE mfa_tokens
            SET is_used = TRUE
            WHERE user_id = $1
              AND token_hash = $2
              AND is_used = FALSE
              AND expires_at > NOW()
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(token_hash)
        .fetch_optional(pool)
        .await
        .context("failed to consume MFA token")?;

        Ok(row.is_some())
    }
}
