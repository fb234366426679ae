//! Account collaborators — current-user resolution, plan precedence, profile.
//!
//! Session token issuance and verification happen upstream at the gateway;
//! this service trusts the `x-user-id` header it forwards. An absent or
//! unknown id resolves to `None` ("nothing to show"), never an error.

use axum::http::HeaderMap;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::account::{OnboardingProfile, User};
use crate::schedule::timeutil::PlanKey;

/// Extracts the gateway-verified user id from request headers.
pub fn user_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Resolves the current user, or `None` when unauthenticated/unknown.
pub async fn current_user(pool: &PgPool, headers: &HeaderMap) -> Result<Option<User>, sqlx::Error> {
    let Some(user_id) = user_id_from_headers(headers) else {
        return Ok(None);
    };
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}

/// Resolves the user's effective plan by precedence:
/// active subscription → latest billing history → onboarding profile → basic.
pub async fn resolve_plan(pool: &PgPool, user_id: Uuid) -> Result<PlanKey, sqlx::Error> {
    let subscribed: Option<String> = sqlx::query_scalar(
        r#"
        SELECT plan FROM subscriptions
        WHERE user_id = $1 AND status = 'active'
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    if let Some(plan) = subscribed {
        return Ok(PlanKey::from_str(&plan));
    }

    let billed: Option<String> = sqlx::query_scalar(
        "SELECT plan FROM billing_history WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    if let Some(plan) = billed {
        return Ok(PlanKey::from_str(&plan));
    }

    let onboarded: Option<Option<String>> =
        sqlx::query_scalar("SELECT plan FROM onboarding_profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    if let Some(Some(plan)) = onboarded {
        return Ok(PlanKey::from_str(&plan));
    }

    Ok(PlanKey::Basic)
}

/// Loads the user's onboarding profile (niche, preferred time, zone), if any.
pub async fn get_profile(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<OnboardingProfile>, sqlx::Error> {
    sqlx::query_as::<_, OnboardingProfile>("SELECT * FROM onboarding_profiles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
}
