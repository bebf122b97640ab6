use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::auth::dto::{
    AuthResponse, LoginRequest, LoginResponse, LogoutRequest, LogoutResponse, RefreshRequest,
    RegisterRequest, SessionResponse,
};
use crate::auth::extractors::AuthContext;
use crate::auth::services;
use crate::error::ApiError;
use crate::state::AppState;
use crate::validation::{parse_login, parse_register};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let input = parse_register(&payload).map_err(ApiError::Validation)?;
    let response = services::register(&state, input).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let input = parse_login(&payload).map_err(ApiError::Validation)?;
    match services::login(&state, input).await? {
        Some(response) => Ok(Json(response)),
        // One message for unknown email and wrong password alike.
        None => Err(ApiError::authentication("Invalid email or password")),
    }
}

#[instrument(skip(state, payload))]
async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let response = services::refresh_session(&state, &payload.refresh_token).await?;
    Ok(Json(response))
}

#[instrument(skip(state, current, payload))]
async fn logout(
    State(state): State<AppState>,
    AuthContext(current): AuthContext,
    payload: Option<Json<LogoutRequest>>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let req = payload.map(|Json(body)| body).unwrap_or_default();
    services::logout(&state, current.user.id, &req).await?;
    Ok(Json(LogoutResponse {
        success: true,
        message: "Logged out successfully",
    }))
}

#[instrument(skip(current))]
async fn me(AuthContext(current): AuthContext) -> Json<SessionResponse> {
    Json(services::current_session(&current))
}
