//! Override resolver — picks the most specific applicable admin override.
//!
//! Specificity is a fixed precedence order: exact user+influencer, then
//! user-only, then influencer-only, then global. Within a tier the most
//! recently created row wins, which the loader guarantees by sorting
//! descending before resolution.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::schedule::ScheduleOverrideRow;

/// Loads every override row that could match this user+influencer pair,
/// newest first.
pub async fn load_overrides(
    pool: &PgPool,
    user_id: Uuid,
    influencer_id: &str,
) -> Result<Vec<ScheduleOverrideRow>, sqlx::Error> {
    sqlx::query_as::<_, ScheduleOverrideRow>(
        r#"
        SELECT * FROM schedule_overrides
        WHERE (user_id = $1 AND influencer_id = $2)
           OR (user_id = $1 AND influencer_id IS NULL)
           OR (user_id IS NULL AND influencer_id = $2)
           OR (user_id IS NULL AND influencer_id IS NULL)
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(influencer_id)
    .fetch_all(pool)
    .await
}

/// Returns the most specific applicable override, or `None` when no tier
/// matches (callers then fall back to default plan behavior).
///
/// `overrides` must be sorted by `created_at` descending (as `load_overrides`
/// returns them) so that within-tier ties resolve to the newest row.
pub fn resolve_override<'a>(
    user_id: Uuid,
    influencer_id: &str,
    overrides: &'a [ScheduleOverrideRow],
) -> Option<&'a ScheduleOverrideRow> {
    overrides
        .iter()
        .find(|o| o.user_id == Some(user_id) && o.influencer_id.as_deref() == Some(influencer_id))
        .or_else(|| {
            overrides
                .iter()
                .find(|o| o.user_id == Some(user_id) && o.influencer_id.is_none())
        })
        .or_else(|| {
            overrides
                .iter()
                .find(|o| o.user_id.is_none() && o.influencer_id.as_deref() == Some(influencer_id))
        })
        .or_else(|| {
            overrides
                .iter()
                .find(|o| o.user_id.is_none() && o.influencer_id.is_none())
        })
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
