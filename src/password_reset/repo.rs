use sqlx::{FromRow, PgExecutor, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Stored reset credential. Only the SHA-256 hash of the raw token is kept;
/// the raw token leaves the system exactly once, inside the emailed link.
#[derive(Debug, Clone, FromRow)]
pub struct PasswordResetToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
    pub used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

const COLUMNS: &str = "id, user_id, email, token_hash, expires_at, used_at, created_at";

impl PasswordResetToken {
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        user_id: Uuid,
        email: &str,
        token_hash: &str,
        expires_at: OffsetDateTime,
    ) -> sqlx::Result<PasswordResetToken> {
        sqlx::query_as::<_, PasswordResetToken>(&format!(
            r#"
            INSERT INTO password_reset_tokens (user_id, email, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(email)
        .bind(token_hash)
        .bind(expires_at)
        .fetch_one(db)
        .await
    }

    pub async fn find_by_hash(
        db: &PgPool,
        token_hash: &str,
    ) -> anyhow::Result<Option<PasswordResetToken>> {
        let row = sqlx::query_as::<_, PasswordResetToken>(&format!(
            "SELECT {COLUMNS} FROM password_reset_tokens WHERE token_hash = $1"
        ))
        .bind(token_hash)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Drop any earlier tokens for the user; only the most recent request
    /// stays redeemable.
    pub async fn delete_for_user<'e>(db: impl PgExecutor<'e>, user_id: Uuid) -> sqlx::Result<u64> {
        let result = sqlx::query("DELETE FROM password_reset_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_id<'e>(db: impl PgExecutor<'e>, id: Uuid) -> sqlx::Result<()> {
        sqlx::query("DELETE FROM password_reset_tokens WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Stamp `used_at`, but only if the row is still unconsumed. Returning
    /// zero rows means another attempt got there first; the caller must
    /// treat that as "already used".
    pub async fn mark_used<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
        used_at: OffsetDateTime,
    ) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "UPDATE password_reset_tokens SET used_at = $1 WHERE id = $2 AND used_at IS NULL",
        )
        .bind(used_at)
        .bind(id)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Garbage-collect rows that can never be redeemed again.
    pub async fn cleanup_expired(db: &PgPool, now: OffsetDateTime) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "DELETE FROM password_reset_tokens WHERE expires_at < $1 OR used_at IS NOT NULL",
        )
        .bind(now)
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }
}
