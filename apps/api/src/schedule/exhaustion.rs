//! Exhaustion notifier — rate-limited alert when a user/influencer pair runs
//! out of assets or is blocked.
//!
//! The de-duplication record is an `admin_actions` row keyed
//! `schedule.exhausted.<influencer_id>`, scoped per user: at most one alert
//! per pair per 24h window, decided by timestamp comparison at call time.
//! Failures here are swallowed and logged; they must never fail or delay the
//! allocation response.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use tracing::warn;
use uuid::Uuid;

use crate::events::{EventBus, ACTIONS_UPDATED};

const RATE_LIMIT_HOURS: i64 = 24;

/// Action key for an exhaustion alert about `influencer_id`.
pub fn exhaustion_action_key(influencer_id: &str) -> String {
    format!("schedule.exhausted.{influencer_id}")
}

/// True when no alert has fired within the rate-limit window.
pub fn should_notify(last_notified_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_notified_at {
        Some(last) => now - last >= Duration::hours(RATE_LIMIT_HOURS),
        None => true,
    }
}

/// Records and broadcasts an exhaustion alert unless one fired within the
/// last 24h. Never propagates errors.
pub async fn maybe_notify_exhausted(
    pool: &PgPool,
    events: &EventBus,
    user_id: Uuid,
    influencer_id: &str,
    detail: &str,
) {
    if let Err(e) = notify_inner(pool, events, user_id, influencer_id, detail).await {
        warn!("Exhaustion notifier failed for user {user_id} influencer {influencer_id}: {e}");
    }
}

async fn notify_inner(
    pool: &PgPool,
    events: &EventBus,
    user_id: Uuid,
    influencer_id: &str,
    detail: &str,
) -> anyhow::Result<()> {
    let action = exhaustion_action_key(influencer_id);

    let last_notified_at: Option<DateTime<Utc>> = sqlx::query_scalar(
        "SELECT MAX(created_at) FROM admin_actions WHERE user_id = $1 AND action = $2",
    )
    .bind(user_id)
    .bind(&action)
    .fetch_one(pool)
    .await?;

    if !should_notify(last_notified_at, Utc::now()) {
        return Ok(());
    }

    let payload = json!({
        "userId": user_id,
        "influencerId": influencer_id,
        "action": action,
        "detail": detail,
    });

    sqlx::query("INSERT INTO admin_actions (user_id, action, detail) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(&action)
        .bind(&payload)
        .execute(pool)
        .await?;

    events.publish(ACTIONS_UPDATED, payload);
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
