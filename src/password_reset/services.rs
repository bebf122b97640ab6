use base64ct::{Base64UrlUnpadded, Encoding};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use tracing::{debug, error, info};

use crate::auth::password::hash_password;
use crate::auth::repo::{RefreshToken, User};
use crate::error::ApiError;
use crate::password_reset::repo::PasswordResetToken;
use crate::state::AppState;

const RESET_TOKEN_BYTES: usize = 32;
const RESET_TOKEN_TTL: Duration = Duration::hours(1);

fn generate_raw_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

fn hash_token(raw: &str) -> String {
    Base64UrlUnpadded::encode_string(Sha256::digest(raw.as_bytes()).as_slice())
}

/// Start a reset. The caller always gets the same generic outcome whether
/// the email exists, the send worked, or anything in between; only the logs
/// know the difference.
pub async fn request_reset(state: &AppState, email: &str) -> Result<(), ApiError> {
    let email = email.trim().to_lowercase();
    let Some(user) = User::find_by_email(&state.db, &email).await? else {
        debug!("password reset requested for unknown email");
        return Ok(());
    };

    PasswordResetToken::delete_for_user(&state.db, user.id).await?;

    let raw_token = generate_raw_token();
    let now = OffsetDateTime::now_utc();
    PasswordResetToken::create(
        &state.db,
        user.id,
        &email,
        &hash_token(&raw_token),
        now + RESET_TOKEN_TTL,
    )
    .await?;

    let reset_url = format!(
        "{}/reset-password?token={}",
        state.config.frontend_url.trim_end_matches('/'),
        raw_token
    );
    if let Err(err) = state.email.send_password_reset(&email, &reset_url).await {
        // Non-fatal: the generic success response stands regardless.
        error!(error = %err, user_id = %user.id, "password reset email failed");
    } else {
        info!(user_id = %user.id, "password reset email sent");
    }
    Ok(())
}

/// Side-effect-free check used by the reset form before the user types a
/// new password.
pub async fn validate_token(state: &AppState, raw_token: &str) -> Result<bool, ApiError> {
    let Some(row) = PasswordResetToken::find_by_hash(&state.db, &hash_token(raw_token)).await?
    else {
        return Ok(false);
    };
    Ok(row.used_at.is_none() && OffsetDateTime::now_utc() < row.expires_at)
}

/// Consume a reset token: rotate the password, stamp the token used and
/// revoke every refresh token for the user, all in one transaction. The
/// guarded `used_at` update closes the race between two concurrent attempts
/// with the same token.
pub async fn reset_password(
    state: &AppState,
    raw_token: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    let Some(row) = PasswordResetToken::find_by_hash(&state.db, &hash_token(raw_token)).await?
    else {
        return Err(ApiError::validation("token", "Invalid or expired reset token"));
    };

    let now = OffsetDateTime::now_utc();
    if row.expires_at <= now {
        PasswordResetToken::delete_by_id(&state.db, row.id).await?;
        return Err(ApiError::validation("token", "Reset token has expired"));
    }
    if row.used_at.is_some() {
        return Err(ApiError::validation(
            "token",
            "Reset token has already been used",
        ));
    }

    let password_hash = hash_password(new_password, state.config.auth.bcrypt_cost)?;

    let mut tx = state.db.begin().await?;
    let consumed = PasswordResetToken::mark_used(&mut *tx, row.id, now).await?;
    if consumed == 0 {
        tx.rollback().await?;
        return Err(ApiError::validation(
            "token",
            "Reset token has already been used",
        ));
    }
    User::update_password(&mut *tx, row.user_id, &password_hash).await?;
    let revoked = RefreshToken::revoke_all_for_user(&mut *tx, row.user_id).await?;
    tx.commit().await?;

    info!(user_id = %row.user_id, revoked, "password reset completed, all sessions revoked");
    Ok(())
}

/// Scheduled sweep; returns how many dead rows were removed.
pub async fn cleanup_expired_tokens(state: &AppState) -> Result<u64, ApiError> {
    let removed =
        PasswordResetToken::cleanup_expired(&state.db, OffsetDateTime::now_utc()).await?;
    if removed > 0 {
        info!(removed, "expired password reset tokens cleaned up");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_tokens_are_unique_and_url_safe() {
        let first = generate_raw_token();
        let second = generate_raw_token();
        assert_ne!(first, second);
        // 32 bytes, unpadded base64url.
        assert_eq!(first.len(), 43);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn token_hash_is_deterministic_and_distinct_from_raw() {
        let raw = generate_raw_token();
        let hash = hash_token(&raw);
        assert_eq!(hash, hash_token(&raw));
        assert_ne!(hash, raw);
        assert_ne!(hash_token("a"), hash_token("b"));
    }

    // Database-backed flow tests; `#[sqlx::test]` gives each its own
    // migrated database.

    use crate::auth::password::verify_password;
    use sqlx::PgPool;
    use uuid::Uuid;

    async fn seeded_user(pool: &PgPool, email: &str, password: &str) -> User {
        let hash = hash_password(password, 4).expect("hash");
        User::create(pool, email, &hash, None).await.expect("user")
    }

    fn assert_token_error(err: ApiError, needle: &str) {
        match err {
            ApiError::Validation(fields) => {
                assert_eq!(fields.len(), 1);
                assert_eq!(fields[0].field, "token");
                assert!(
                    fields[0].message.contains(needle),
                    "{:?} should mention {needle:?}",
                    fields[0].message
                );
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[sqlx::test]
    async fn reset_token_is_single_use_and_revokes_sessions(pool: PgPool) {
        let state = AppState::fake_with_pool(pool.clone());
        let user = seeded_user(&pool, "reset@example.com", "Old1!pass").await;
        RefreshToken::create(
            &pool,
            Uuid::new_v4(),
            user.id,
            OffsetDateTime::now_utc() + Duration::days(7),
        )
        .await
        .expect("refresh row");

        let raw = generate_raw_token();
        PasswordResetToken::create(
            &pool,
            user.id,
            &user.email,
            &hash_token(&raw),
            OffsetDateTime::now_utc() + RESET_TOKEN_TTL,
        )
        .await
        .expect("token row");

        assert!(validate_token(&state, &raw).await.expect("validate"));
        reset_password(&state, &raw, "NewSecur3!Pass")
            .await
            .expect("first consumption");

        let updated = User::find_by_email(&pool, "reset@example.com")
            .await
            .expect("query")
            .expect("user");
        assert!(verify_password("NewSecur3!Pass", &updated.password_hash));
        assert!(!verify_password("Old1!pass", &updated.password_hash));

        let sessions: i64 =
            sqlx::query_scalar("SELECT count(*) FROM refresh_tokens WHERE user_id = $1")
                .bind(user.id)
                .fetch_one(&pool)
                .await
                .expect("count");
        assert_eq!(sessions, 0, "a reset must revoke every session");

        let err = reset_password(&state, &raw, "Another1!Pass")
            .await
            .unwrap_err();
        assert_token_error(err, "already been used");
        assert!(!validate_token(&state, &raw).await.expect("validate"));
    }

    #[sqlx::test]
    async fn mark_used_guard_blocks_a_second_consumer(pool: PgPool) {
        let user = seeded_user(&pool, "race@example.com", "Old1!pass").await;
        let row = PasswordResetToken::create(
            &pool,
            user.id,
            &user.email,
            &hash_token(&generate_raw_token()),
            OffsetDateTime::now_utc() + RESET_TOKEN_TTL,
        )
        .await
        .expect("token row");

        let now = OffsetDateTime::now_utc();
        assert_eq!(
            PasswordResetToken::mark_used(&pool, row.id, now)
                .await
                .expect("first stamp"),
            1
        );
        assert_eq!(
            PasswordResetToken::mark_used(&pool, row.id, now)
                .await
                .expect("second stamp"),
            0,
            "a stamped row must not stamp again"
        );
    }

    #[sqlx::test]
    async fn expired_token_fails_and_is_removed(pool: PgPool) {
        let state = AppState::fake_with_pool(pool.clone());
        let user = seeded_user(&pool, "late@example.com", "Old1!pass").await;
        let raw = generate_raw_token();
        PasswordResetToken::create(
            &pool,
            user.id,
            &user.email,
            &hash_token(&raw),
            OffsetDateTime::now_utc() - Duration::minutes(1),
        )
        .await
        .expect("token row");

        let err = reset_password(&state, &raw, "NewSecur3!Pass")
            .await
            .unwrap_err();
        assert_token_error(err, "expired");
        assert!(PasswordResetToken::find_by_hash(&pool, &hash_token(&raw))
            .await
            .expect("query")
            .is_none());
    }

    #[sqlx::test]
    async fn request_reset_keeps_only_the_latest_token(pool: PgPool) {
        let state = AppState::fake_with_pool(pool.clone());
        let user = seeded_user(&pool, "multi@example.com", "Old1!pass").await;

        request_reset(&state, "multi@example.com")
            .await
            .expect("first request");
        request_reset(&state, "Multi@Example.com")
            .await
            .expect("second request");

        let rows: i64 =
            sqlx::query_scalar("SELECT count(*) FROM password_reset_tokens WHERE user_id = $1")
                .bind(user.id)
                .fetch_one(&pool)
                .await
                .expect("count");
        assert_eq!(rows, 1);

        request_reset(&state, "ghost@example.com")
            .await
            .expect("unknown email still answers with the generic success");
    }

    #[sqlx::test]
    async fn cleanup_removes_dead_rows_only(pool: PgPool) {
        let state = AppState::fake_with_pool(pool.clone());
        let user = seeded_user(&pool, "gc@example.com", "Old1!pass").await;
        let now = OffsetDateTime::now_utc();

        let live = generate_raw_token();
        PasswordResetToken::create(&pool, user.id, &user.email, &hash_token(&live), now + RESET_TOKEN_TTL)
            .await
            .expect("live row");
        PasswordResetToken::create(
            &pool,
            user.id,
            &user.email,
            &hash_token(&generate_raw_token()),
            now - Duration::hours(1),
        )
        .await
        .expect("expired row");
        let used = PasswordResetToken::create(
            &pool,
            user.id,
            &user.email,
            &hash_token(&generate_raw_token()),
            now + RESET_TOKEN_TTL,
        )
        .await
        .expect("used row");
        PasswordResetToken::mark_used(&pool, used.id, now)
            .await
            .expect("stamp");

        let removed = cleanup_expired_tokens(&state).await.expect("cleanup");
        assert_eq!(removed, 2);
        assert!(PasswordResetToken::find_by_hash(&pool, &hash_token(&live))
            .await
            .expect("query")
            .is_some());
    }
}
