use axum::extract::FromRef;
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::dto::{AuthResponse, LoginResponse, LogoutRequest, SessionResponse};
use crate::auth::extractors::CurrentUser;
use crate::auth::jwt::JwtKeys;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo::{Plan, RefreshToken, Subscription, SubscriptionStatus, User};
use crate::auth::status;
use crate::error::{is_unique_violation, ApiError};
use crate::state::AppState;
use crate::validation::{ParsedLogin, ParsedRegister};

fn rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_default()
}

/// Create the user, its free-plan subscription (expiring at the trial end)
/// and a refresh-token row in one transaction, then issue both tokens.
/// A lost race against a concurrent registration surfaces as the same
/// Conflict the pre-check produces.
pub async fn register(state: &AppState, input: ParsedRegister) -> Result<AuthResponse, ApiError> {
    let keys = JwtKeys::from_ref(state);

    if User::find_by_email(&state.db, &input.email).await?.is_some() {
        warn!(email = %input.email, "email already registered");
        return Err(ApiError::conflict("Email already registered"));
    }

    let password_hash = hash_password(&input.password, state.config.auth.bcrypt_cost)?;
    let now = OffsetDateTime::now_utc();
    let trial_ends_at = now + Duration::days(state.config.auth.trial_duration_days);
    let token_id = Uuid::new_v4();

    let mut tx = state.db.begin().await?;
    let user = User::create(&mut *tx, &input.email, &password_hash, input.name.as_deref())
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::conflict("Email already registered")
            } else {
                ApiError::Database(e)
            }
        })?;
    Subscription::create(
        &mut *tx,
        user.id,
        Plan::Free,
        SubscriptionStatus::Active,
        Some(trial_ends_at),
    )
    .await?;
    RefreshToken::create(&mut *tx, token_id, user.id, keys.refresh_expires_at(now)).await?;
    tx.commit().await?;

    let access_token = keys.sign_access(&user)?;
    let refresh_token = keys.sign_refresh(user.id, token_id)?;

    state.analytics.record(
        "signup_completed",
        json!({ "user_id": user.id, "trial_ends_at": rfc3339(trial_ends_at) }),
    );
    info!(user_id = %user.id, email = %user.email, "user registered");

    Ok(AuthResponse {
        user: user.into(),
        access_token,
        refresh_token,
    })
}

/// Authenticate a user. Unknown email and wrong password both come back as
/// `None`; the handler maps either onto the same generic 401 so callers
/// cannot enumerate accounts.
pub async fn login(
    state: &AppState,
    input: ParsedLogin,
) -> Result<Option<LoginResponse>, ApiError> {
    let keys = JwtKeys::from_ref(state);

    let Some(user) = User::find_by_email(&state.db, &input.email).await? else {
        warn!(email = %input.email, "login for unknown email");
        return Ok(None);
    };
    if !verify_password(&input.password, &user.password_hash) {
        warn!(user_id = %user.id, "login with invalid password");
        return Ok(None);
    }

    let subscription = Subscription::find_by_user(&state.db, user.id).await?;
    let now = OffsetDateTime::now_utc();
    let token_id = Uuid::new_v4();
    RefreshToken::create(&state.db, token_id, user.id, keys.refresh_expires_at(now)).await?;

    let access_token = keys.sign_access(&user)?;
    let refresh_token = keys.sign_refresh(user.id, token_id)?;
    let subscription_status = status::determine_plan_status(
        &user,
        subscription.as_ref(),
        now,
        state.config.auth.trial_duration_days,
    );

    state
        .analytics
        .record("login_completed", json!({ "user_id": user.id }));
    info!(user_id = %user.id, email = %user.email, "user logged in");

    Ok(Some(LoginResponse {
        user: user.into(),
        access_token,
        refresh_token,
        subscription_status,
    }))
}

/// Revoke one session, all sessions, or none (client-side-only logout).
/// Never fails because the token was already absent or unverifiable.
/// Returns the method recorded in the analytics event.
pub async fn logout(
    state: &AppState,
    user_id: Uuid,
    req: &LogoutRequest,
) -> Result<&'static str, ApiError> {
    let keys = JwtKeys::from_ref(state);

    let method = if req.logout_all {
        let revoked = RefreshToken::revoke_all_for_user(&state.db, user_id).await?;
        info!(user_id = %user_id, revoked, "all sessions revoked");
        "all_sessions"
    } else if let Some(token) = req.refresh_token.as_deref() {
        // Expired tokens still resolve to their row id so the row gets
        // cleaned up; anything unverifiable is simply nothing to revoke.
        if let Some(token_id) = keys.refresh_token_id(token) {
            RefreshToken::revoke_by_id(&state.db, token_id).await?;
        }
        "single_session"
    } else {
        "client_only"
    };

    state.analytics.record(
        "logout_completed",
        json!({ "user_id": user_id, "logout_all": req.logout_all, "method": method }),
    );
    Ok(method)
}

/// Shape the current-session view. `subscription_status` is the stored
/// status (not the login-time plan derivation) and `trial_ends_at` only
/// surfaces while the plan is still free.
pub fn current_session(current: &CurrentUser) -> SessionResponse {
    let subscription = current.subscription.as_ref();
    SessionResponse {
        user_id: current.user.id,
        email: current.user.email.clone(),
        name: current.user.name.clone(),
        avatar_url: current.user.avatar_url.clone(),
        subscription_status: status::subscription_status(subscription),
        trial_ends_at: status::trial_ends_at(subscription),
        is_verified: current.user.email_verified,
        role: current.user.role,
        created_at: current.user.created_at,
    }
}

/// Exchange a refresh token for a fresh pair. The signature alone is not
/// enough: the stored row must still exist (absence means revoked) and must
/// itself be unexpired. The old row is replaced by the new one atomically.
pub async fn refresh_session(
    state: &AppState,
    refresh_token: &str,
) -> Result<AuthResponse, ApiError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify_refresh(refresh_token)?;

    let Some(row) = RefreshToken::find_by_id(&state.db, claims.jti).await? else {
        warn!(user_id = %claims.sub, token_id = %claims.jti, "refresh token not in store");
        return Err(ApiError::authentication("Invalid token"));
    };
    let now = OffsetDateTime::now_utc();
    if row.expires_at <= now {
        RefreshToken::revoke_by_id(&state.db, row.id).await?;
        return Err(ApiError::authentication("Token has expired"));
    }
    let Some(user) = User::find_by_id(&state.db, claims.sub).await? else {
        return Err(ApiError::authentication("Invalid token"));
    };

    let new_token_id = Uuid::new_v4();
    let mut tx = state.db.begin().await?;
    RefreshToken::revoke_by_id(&mut *tx, row.id).await?;
    RefreshToken::create(&mut *tx, new_token_id, user.id, keys.refresh_expires_at(now)).await?;
    tx.commit().await?;

    let access_token = keys.sign_access(&user)?;
    let refresh_token = keys.sign_refresh(user.id, new_token_id)?;
    info!(user_id = %user.id, "session refreshed");

    Ok(AuthResponse {
        user: user.into(),
        access_token,
        refresh_token,
    })
}
