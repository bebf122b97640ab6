use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::auth::repo::{Plan, Role, Subscription, SubscriptionStatus, User};

/// Effective plan state derived at login time. Distinct from the stored
/// `SubscriptionStatus` returned by the session endpoint; the two views are
/// deliberately separate computations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Free,
    Trial,
    Pro,
}

fn pro_subscription_active(subscription: Option<&Subscription>, now: OffsetDateTime) -> bool {
    subscription.is_some_and(|sub| {
        sub.plan == Plan::Pro
            && sub.status == SubscriptionStatus::Active
            && sub.expires_at.map_or(true, |expires| expires > now)
    })
}

/// Plan status at login: admins are pro, an active unexpired pro
/// subscription is pro, otherwise trial inside the window
/// `[created_at, created_at + trial_days)` and free after it.
pub fn determine_plan_status(
    user: &User,
    subscription: Option<&Subscription>,
    now: OffsetDateTime,
    trial_duration_days: i64,
) -> PlanStatus {
    if user.role == Role::Admin {
        return PlanStatus::Pro;
    }
    if pro_subscription_active(subscription, now) {
        return PlanStatus::Pro;
    }
    if now < user.created_at + Duration::days(trial_duration_days) {
        PlanStatus::Trial
    } else {
        PlanStatus::Free
    }
}

/// Stored subscription status for the session endpoint. A user without a
/// subscription row reads as `active`.
pub fn subscription_status(subscription: Option<&Subscription>) -> SubscriptionStatus {
    subscription
        .map(|sub| sub.status)
        .unwrap_or(SubscriptionStatus::Active)
}

/// Trial end for the session endpoint: the subscription's expiry, but only
/// while the plan is still free.
pub fn trial_ends_at(subscription: Option<&Subscription>) -> Option<OffsetDateTime> {
    subscription
        .filter(|sub| sub.plan == Plan::Free)
        .and_then(|sub| sub.expires_at)
}

/// Pro gate shared by the `ProUser` extractor and phase-access checks.
pub fn has_pro_access(
    user: &User,
    subscription: Option<&Subscription>,
    now: OffsetDateTime,
) -> bool {
    user.role == Role::Admin || pro_subscription_active(subscription, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use uuid::Uuid;

    fn user_with(role: Role, created_at: OffsetDateTime) -> User {
        User {
            id: Uuid::new_v4(),
            email: "status@example.com".into(),
            password_hash: "irrelevant".into(),
            name: None,
            avatar_url: None,
            role,
            email_verified: false,
            created_at,
        }
    }

    fn subscription_with(
        user_id: Uuid,
        plan: Plan,
        status: SubscriptionStatus,
        expires_at: Option<OffsetDateTime>,
    ) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            user_id,
            plan,
            status,
            expires_at,
            created_at: datetime!(2026-01-01 00:00:00 UTC),
        }
    }

    #[test]
    fn admin_is_always_pro() {
        let user = user_with(Role::Admin, datetime!(2020-01-01 00:00:00 UTC));
        let now = datetime!(2026-06-01 00:00:00 UTC);
        assert_eq!(determine_plan_status(&user, None, now, 14), PlanStatus::Pro);
    }

    #[test]
    fn active_unexpired_pro_subscription_is_pro() {
        let user = user_with(Role::Free, datetime!(2020-01-01 00:00:00 UTC));
        let now = datetime!(2026-06-01 00:00:00 UTC);
        let sub = subscription_with(
            user.id,
            Plan::Pro,
            SubscriptionStatus::Active,
            Some(datetime!(2026-07-01 00:00:00 UTC)),
        );
        assert_eq!(
            determine_plan_status(&user, Some(&sub), now, 14),
            PlanStatus::Pro
        );
    }

    #[test]
    fn pro_subscription_with_null_expiry_is_pro() {
        let user = user_with(Role::Free, datetime!(2020-01-01 00:00:00 UTC));
        let now = datetime!(2026-06-01 00:00:00 UTC);
        let sub = subscription_with(user.id, Plan::Pro, SubscriptionStatus::Active, None);
        assert_eq!(
            determine_plan_status(&user, Some(&sub), now, 14),
            PlanStatus::Pro
        );
    }

    #[test]
    fn expired_or_cancelled_pro_subscription_falls_through() {
        let user = user_with(Role::Free, datetime!(2020-01-01 00:00:00 UTC));
        let now = datetime!(2026-06-01 00:00:00 UTC);
        let expired = subscription_with(
            user.id,
            Plan::Pro,
            SubscriptionStatus::Active,
            Some(datetime!(2026-05-01 00:00:00 UTC)),
        );
        let cancelled = subscription_with(user.id, Plan::Pro, SubscriptionStatus::Cancelled, None);
        assert_eq!(
            determine_plan_status(&user, Some(&expired), now, 14),
            PlanStatus::Free
        );
        assert_eq!(
            determine_plan_status(&user, Some(&cancelled), now, 14),
            PlanStatus::Free
        );
    }

    #[test]
    fn trial_window_boundary() {
        let user = user_with(Role::Free, datetime!(2026-01-01 00:00:00 UTC));
        assert_eq!(
            determine_plan_status(&user, None, datetime!(2026-01-01 00:00:00 UTC), 14),
            PlanStatus::Trial
        );
        assert_eq!(
            determine_plan_status(&user, None, datetime!(2026-01-14 23:59:59 UTC), 14),
            PlanStatus::Trial
        );
        assert_eq!(
            determine_plan_status(&user, None, datetime!(2026-01-15 00:00:00 UTC), 14),
            PlanStatus::Free
        );
        assert_eq!(
            determine_plan_status(&user, None, datetime!(2026-01-15 00:00:01 UTC), 14),
            PlanStatus::Free
        );
    }

    #[test]
    fn trial_duration_is_configurable() {
        let user = user_with(Role::Free, datetime!(2026-01-01 00:00:00 UTC));
        let now = datetime!(2026-01-20 00:00:00 UTC);
        assert_eq!(determine_plan_status(&user, None, now, 30), PlanStatus::Trial);
        assert_eq!(determine_plan_status(&user, None, now, 14), PlanStatus::Free);
    }

    #[test]
    fn stored_status_defaults_to_active_without_a_row() {
        assert_eq!(subscription_status(None), SubscriptionStatus::Active);
        let sub = subscription_with(
            Uuid::new_v4(),
            Plan::Free,
            SubscriptionStatus::Cancelled,
            None,
        );
        assert_eq!(
            subscription_status(Some(&sub)),
            SubscriptionStatus::Cancelled
        );
    }

    #[test]
    fn trial_ends_at_only_for_free_plans() {
        let expiry = datetime!(2026-01-15 00:00:00 UTC);
        let free = subscription_with(
            Uuid::new_v4(),
            Plan::Free,
            SubscriptionStatus::Active,
            Some(expiry),
        );
        let pro = subscription_with(
            Uuid::new_v4(),
            Plan::Pro,
            SubscriptionStatus::Active,
            Some(expiry),
        );
        assert_eq!(trial_ends_at(Some(&free)), Some(expiry));
        assert_eq!(trial_ends_at(Some(&pro)), None);
        assert_eq!(trial_ends_at(None), None);
    }

    #[test]
    fn pro_access_requires_admin_or_live_pro_subscription() {
        let now = datetime!(2026-06-01 00:00:00 UTC);
        let admin = user_with(Role::Admin, datetime!(2026-05-01 00:00:00 UTC));
        assert!(has_pro_access(&admin, None, now));

        let free = user_with(Role::Free, datetime!(2026-05-01 00:00:00 UTC));
        assert!(!has_pro_access(&free, None, now));

        let live = subscription_with(free.id, Plan::Pro, SubscriptionStatus::Active, None);
        assert!(has_pro_access(&free, Some(&live), now));
    }
}
