use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::auth::extractors::AuthContext;
use crate::error::ApiError;
use crate::onboarding::repo::OnboardingResponse;
use crate::onboarding::services::{self, OnboardingUpdate, OnboardingView};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/onboarding", get(get_onboarding).patch(update_onboarding))
        .route("/onboarding/complete", post(complete_onboarding))
}

#[instrument(skip(state, current))]
async fn get_onboarding(
    State(state): State<AppState>,
    AuthContext(current): AuthContext,
) -> Result<Json<OnboardingView>, ApiError> {
    let view = services::get(&state, current.user.id).await?;
    Ok(Json(view))
}

#[instrument(skip(state, current, payload))]
async fn update_onboarding(
    State(state): State<AppState>,
    AuthContext(current): AuthContext,
    Json(payload): Json<OnboardingUpdate>,
) -> Result<Json<OnboardingResponse>, ApiError> {
    let row = services::upsert_step(&state, current.user.id, payload).await?;
    Ok(Json(row))
}

#[instrument(skip(state, current))]
async fn complete_onboarding(
    State(state): State<AppState>,
    AuthContext(current): AuthContext,
) -> Result<Json<OnboardingResponse>, ApiError> {
    let row = services::complete(&state, current.user.id).await?;
    Ok(Json(row))
}
