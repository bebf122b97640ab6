use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::auth::claims::{AccessClaims, RefreshClaims};
use crate::auth::repo::User;
use crate::config::JwtConfig;
use crate::error::ApiError;
use crate::state::AppState;

/// Signing and verification material for both token classes. Access and
/// refresh tokens use distinct secrets, so a token of one class can never
/// verify as the other.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        let JwtConfig {
            access_secret,
            refresh_secret,
            issuer,
            audience,
            access_ttl_minutes,
            refresh_ttl_minutes,
        } = state.config.jwt.clone();
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            issuer,
            audience,
            access_ttl: Duration::from_secs((access_ttl_minutes as u64) * 60),
            refresh_ttl: Duration::from_secs((refresh_ttl_minutes as u64) * 60),
        }
    }
}

fn map_jwt_error(err: jsonwebtoken::errors::Error) -> ApiError {
    match err.kind() {
        ErrorKind::ExpiredSignature => ApiError::authentication("Token has expired"),
        ErrorKind::InvalidToken
        | ErrorKind::InvalidSignature
        | ErrorKind::InvalidIssuer
        | ErrorKind::InvalidAudience => ApiError::authentication("Invalid token"),
        _ => ApiError::authentication("Token verification failed"),
    }
}

impl JwtKeys {
    /// Refresh TTL in milliseconds, for expiry date math against stored rows.
    pub fn refresh_ttl_ms(&self) -> i64 {
        self.refresh_ttl.as_millis() as i64
    }

    pub fn refresh_expires_at(&self, now: OffsetDateTime) -> OffsetDateTime {
        now + TimeDuration::milliseconds(self.refresh_ttl_ms())
    }

    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.access_ttl.as_secs() as i64);
        let claims = AccessClaims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.access_encoding)?;
        debug!(user_id = %user.id, "access token signed");
        Ok(token)
    }

    pub fn sign_refresh(&self, user_id: Uuid, token_id: Uuid) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.refresh_ttl.as_secs() as i64);
        let claims = RefreshClaims {
            sub: user_id,
            jti: token_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.refresh_encoding)?;
        debug!(user_id = %user_id, token_id = %token_id, "refresh token signed");
        Ok(token)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    pub fn verify_access(&self, token: &str) -> Result<AccessClaims, ApiError> {
        let data = decode::<AccessClaims>(token, &self.access_decoding, &self.validation())
            .map_err(map_jwt_error)?;
        debug!(user_id = %data.claims.sub, "access token verified");
        Ok(data.claims)
    }

    /// Resolve a refresh token to its stored-row id for revocation.
    /// Expiry is not validated here so an expired token can still have its
    /// row removed; an unverifiable token yields `None`.
    pub fn refresh_token_id(&self, token: &str) -> Option<Uuid> {
        let mut validation = self.validation();
        validation.validate_exp = false;
        decode::<RefreshClaims>(token, &self.refresh_decoding, &validation)
            .ok()
            .map(|data| data.claims.jti)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims, ApiError> {
        let data = decode::<RefreshClaims>(token, &self.refresh_decoding, &self.validation())
            .map_err(map_jwt_error)?;
        debug!(user_id = %data.claims.sub, token_id = %data.claims.jti, "refresh token verified");
        Ok(data.claims)
    }

    #[cfg(test)]
    pub(crate) fn encode_access_claims(&self, claims: &AccessClaims) -> String {
        encode(&Header::default(), claims, &self.access_encoding).expect("encode test claims")
    }
}
