use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo::{Role, SubscriptionStatus, User};
use crate::auth::status::PlanStatus;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for token refresh.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Request body for logout. Both fields optional: a client holding only
/// local state may send neither and still log out successfully.
#[derive(Debug, Default, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub logout_all: bool,
}

/// Public part of the user returned to clients. Never carries the
/// password hash.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub email_verified: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            avatar_url: user.avatar_url,
            role: user.role,
            email_verified: user.email_verified,
            created_at: user.created_at,
        }
    }
}

/// Response for register and refresh.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}

/// Response for login; carries the plan status derived at login time.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
    pub subscription_status: PlanStatus,
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub success: bool,
    pub message: &'static str,
}

/// `GET /auth/me` payload. `subscription_status` here is the stored
/// subscription status, not the plan status derived at login.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub subscription_status: SubscriptionStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub trial_ends_at: Option<OffsetDateTime>,
    pub is_verified: bool,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn public_user_never_serializes_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            password_hash: "$2b$12$secret".into(),
            name: Some("Tess".into()),
            avatar_url: None,
            role: Role::Free,
            email_verified: false,
            created_at: datetime!(2026-01-01 00:00:00 UTC),
        };
        let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("secret"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn session_response_serializes_rfc3339_timestamps() {
        let response = SessionResponse {
            user_id: Uuid::new_v4(),
            email: "a@b.com".into(),
            name: None,
            avatar_url: None,
            subscription_status: SubscriptionStatus::Active,
            trial_ends_at: Some(datetime!(2026-01-15 00:00:00 UTC)),
            is_verified: true,
            role: Role::Free,
            created_at: datetime!(2026-01-01 00:00:00 UTC),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("2026-01-15T00:00:00Z"));
        assert!(json.contains("\"subscription_status\":\"active\""));
    }
}
