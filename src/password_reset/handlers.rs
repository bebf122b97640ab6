use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{ApiError, FieldError};
use crate::password_reset::services;
use crate::state::AppState;
use crate::validation::{is_valid_email, password_errors};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
        .route("/auth/validate-reset-token/:token", get(validate_token))
}

#[derive(Debug, Deserialize)]
struct ForgotPasswordRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
struct ResetPasswordRequest {
    token: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct GenericResponse {
    success: bool,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ValidateResponse {
    valid: bool,
}

/// Always answers with the same generic body. A malformed address reveals
/// as little as an unknown one; only well-formed emails reach the store.
#[instrument(skip(state, payload))]
async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<GenericResponse>, ApiError> {
    let email = payload.email.trim().to_lowercase();
    if is_valid_email(&email) {
        services::request_reset(&state, &email).await?;
    } else {
        debug!("password reset requested for malformed email");
    }
    Ok(Json(GenericResponse {
        success: true,
        message: "If that email is registered, a reset link has been sent",
    }))
}

#[instrument(skip(state, payload))]
async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<GenericResponse>, ApiError> {
    let errors: Vec<FieldError> = password_errors(&payload.password);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    services::reset_password(&state, &payload.token, &payload.password).await?;
    Ok(Json(GenericResponse {
        success: true,
        message: "Password has been reset",
    }))
}

#[instrument(skip(state, token))]
async fn validate_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let valid = services::validate_token(&state, &token).await?;
    Ok(Json(ValidateResponse { valid }))
}
