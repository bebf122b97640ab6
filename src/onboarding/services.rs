use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, FieldError};
use crate::onboarding::repo::{OnboardingDraft, OnboardingResponse};
use crate::state::AppState;

pub const MIN_WEEKLY_HOURS: i32 = 1;
pub const MAX_WEEKLY_HOURS: i32 = 80;

/// The role value that requires free-text clarification.
const OTHER_ROLE: &str = "other";

/// One wizard step's worth of answers; absent fields leave the stored
/// values untouched.
#[derive(Debug, Default, Deserialize)]
pub struct OnboardingUpdate {
    pub current_role: Option<String>,
    pub custom_role_text: Option<String>,
    pub target_role: Option<String>,
    pub weekly_hours: Option<i32>,
    pub skills_to_skip: Option<Vec<String>>,
}

/// Which steps have an answer, inferred from the stored record.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct OnboardingProgress {
    pub current_role: bool,
    pub target_role: bool,
    pub weekly_hours: bool,
    pub skills_to_skip: bool,
    pub completed: bool,
}

#[derive(Debug, Serialize)]
pub struct OnboardingView {
    pub response: Option<OnboardingResponse>,
    pub progress: OnboardingProgress,
}

/// Fold one step into the existing record. Picking a non-`other` role
/// clears any stale custom text.
pub fn merge(existing: Option<&OnboardingResponse>, update: OnboardingUpdate) -> OnboardingDraft {
    let mut draft = existing.map(|row| OnboardingDraft {
        current_role: row.current_role.clone(),
        custom_role_text: row.custom_role_text.clone(),
        target_role: row.target_role.clone(),
        weekly_hours: row.weekly_hours,
        skills_to_skip: row.skills_to_skip.clone(),
    })
    .unwrap_or_default();

    if let Some(current_role) = update.current_role {
        if current_role != OTHER_ROLE {
            draft.custom_role_text = None;
        }
        draft.current_role = Some(current_role);
    }
    if let Some(custom_role_text) = update.custom_role_text {
        draft.custom_role_text = Some(custom_role_text);
    }
    if let Some(target_role) = update.target_role {
        draft.target_role = Some(target_role);
    }
    if let Some(weekly_hours) = update.weekly_hours {
        draft.weekly_hours = Some(weekly_hours);
    }
    if let Some(skills_to_skip) = update.skills_to_skip {
        draft.skills_to_skip = skills_to_skip;
    }
    draft
}

/// Cross-field rules checked against the merged record.
pub fn validate_draft(draft: &OnboardingDraft) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if draft.current_role.as_deref() == Some(OTHER_ROLE)
        && draft
            .custom_role_text
            .as_deref()
            .map_or(true, |text| text.trim().is_empty())
    {
        errors.push(FieldError::new(
            "custom_role_text",
            "Required when current role is 'other'",
        ));
    }
    if let Some(hours) = draft.weekly_hours {
        if !(MIN_WEEKLY_HOURS..=MAX_WEEKLY_HOURS).contains(&hours) {
            errors.push(FieldError::new(
                "weekly_hours",
                "Weekly hours must be between 1 and 80",
            ));
        }
    }
    errors
}

pub fn progress(response: Option<&OnboardingResponse>) -> OnboardingProgress {
    match response {
        None => OnboardingProgress {
            current_role: false,
            target_role: false,
            weekly_hours: false,
            skills_to_skip: false,
            completed: false,
        },
        Some(row) => OnboardingProgress {
            current_role: row.current_role.is_some(),
            target_role: row.target_role.is_some(),
            weekly_hours: row.weekly_hours.is_some(),
            skills_to_skip: !row.skills_to_skip.is_empty(),
            completed: row.completed_at.is_some(),
        },
    }
}

pub async fn get(state: &AppState, user_id: Uuid) -> Result<OnboardingView, ApiError> {
    let response = OnboardingResponse::find_by_user(&state.db, user_id).await?;
    let progress = progress(response.as_ref());
    Ok(OnboardingView { response, progress })
}

pub async fn upsert_step(
    state: &AppState,
    user_id: Uuid,
    update: OnboardingUpdate,
) -> Result<OnboardingResponse, ApiError> {
    let existing = OnboardingResponse::find_by_user(&state.db, user_id).await?;
    let draft = merge(existing.as_ref(), update);
    let errors = validate_draft(&draft);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }
    let row = OnboardingResponse::upsert(&state.db, user_id, &draft).await?;
    Ok(row)
}

/// Final wizard step. All required answers must be present; the completion
/// timestamp is what (eventually) triggers roadmap generation.
pub async fn complete(state: &AppState, user_id: Uuid) -> Result<OnboardingResponse, ApiError> {
    let existing = OnboardingResponse::find_by_user(&state.db, user_id).await?;
    let mut errors = Vec::new();
    let row = match existing {
        None => {
            return Err(ApiError::validation(
                "onboarding",
                "Onboarding has not been started",
            ))
        }
        Some(row) => row,
    };
    if row.current_role.is_none() {
        errors.push(FieldError::new("current_role", "Current role is required"));
    }
    if row.target_role.is_none() {
        errors.push(FieldError::new("target_role", "Target role is required"));
    }
    if row.weekly_hours.is_none() {
        errors.push(FieldError::new("weekly_hours", "Weekly hours is required"));
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let completed =
        OnboardingResponse::mark_completed(&state.db, user_id, OffsetDateTime::now_utc()).await?;
    info!(user_id = %user_id, "onboarding completed");
    Ok(completed)
}
