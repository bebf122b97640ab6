use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// One onboarding record per user, filled in step by step. `completed_at`
/// stays null until the final step.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OnboardingResponse {
    pub user_id: Uuid,
    pub current_role: Option<String>,
    pub custom_role_text: Option<String>,
    pub target_role: Option<String>,
    pub weekly_hours: Option<i32>,
    pub skills_to_skip: Vec<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Fully merged state written by an upsert. Built in the service layer so
/// cross-field rules are checked against the whole record, not one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OnboardingDraft {
    pub current_role: Option<String>,
    pub custom_role_text: Option<String>,
    pub target_role: Option<String>,
    pub weekly_hours: Option<i32>,
    pub skills_to_skip: Vec<String>,
}

// current_role is quoted: CURRENT_ROLE is a reserved word in Postgres.
const COLUMNS: &str = r#"user_id, "current_role", custom_role_text, target_role, weekly_hours, skills_to_skip, completed_at, created_at, updated_at"#;

impl OnboardingResponse {
    pub async fn find_by_user(
        db: &PgPool,
        user_id: Uuid,
    ) -> anyhow::Result<Option<OnboardingResponse>> {
        let row = sqlx::query_as::<_, OnboardingResponse>(&format!(
            "SELECT {COLUMNS} FROM onboarding_responses WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    pub async fn upsert(
        db: &PgPool,
        user_id: Uuid,
        draft: &OnboardingDraft,
    ) -> sqlx::Result<OnboardingResponse> {
        sqlx::query_as::<_, OnboardingResponse>(&format!(
            r#"
            INSERT INTO onboarding_responses
                (user_id, "current_role", custom_role_text, target_role, weekly_hours, skills_to_skip)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                "current_role" = EXCLUDED."current_role",
                custom_role_text = EXCLUDED.custom_role_text,
                target_role = EXCLUDED.target_role,
                weekly_hours = EXCLUDED.weekly_hours,
                skills_to_skip = EXCLUDED.skills_to_skip,
                updated_at = now()
            RETURNING {COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&draft.current_role)
        .bind(&draft.custom_role_text)
        .bind(&draft.target_role)
        .bind(draft.weekly_hours)
        .bind(&draft.skills_to_skip)
        .fetch_one(db)
        .await
    }

    pub async fn mark_completed(
        db: &PgPool,
        user_id: Uuid,
        completed_at: OffsetDateTime,
    ) -> sqlx::Result<OnboardingResponse> {
        sqlx::query_as::<_, OnboardingResponse>(&format!(
            r#"
            UPDATE onboarding_responses
            SET completed_at = $1, updated_at = now()
            WHERE user_id = $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(completed_at)
        .bind(user_id)
        .fetch_one(db)
        .await
    }
}
