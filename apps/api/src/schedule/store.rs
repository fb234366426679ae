//! Persistence operations for the allocation engine.
//!
//! Inserts use `ON CONFLICT DO NOTHING` against the partial unique indexes on
//! (user, influencer, date, time) and (user, influencer, image) so concurrent
//! allocators race safely: the loser's rows are skipped and the engine's
//! re-read reflects whichever writes committed.

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::schedule::{ScheduledPostRow, STATUS_SCHEDULED};
use crate::schedule::engine::StagedPost;

/// Returns true when the influencer slug is registered.
pub async fn influencer_exists(pool: &PgPool, influencer_id: &str) -> Result<bool, sqlx::Error> {
    let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM influencers WHERE id = $1")
        .bind(influencer_id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// All scheduled rows for the pair whose schedule_date falls in `[from, to)`,
/// date-ascending.
pub async fn scheduled_in_window(
    pool: &PgPool,
    user_id: Uuid,
    influencer_id: &str,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<Vec<ScheduledPostRow>, sqlx::Error> {
    sqlx::query_as::<_, ScheduledPostRow>(
        r#"
        SELECT * FROM scheduled_posts
        WHERE user_id = $1 AND influencer_id = $2 AND status = $3
          AND schedule_date >= $4 AND schedule_date < $5
        ORDER BY schedule_date ASC
        "#,
    )
    .bind(user_id)
    .bind(influencer_id)
    .bind(STATUS_SCHEDULED)
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await
}

/// Image paths already attached to a scheduled (non-cancelled) row for the
/// pair. Derived fresh per call; never cached.
pub async fn used_image_srcs(
    pool: &PgPool,
    user_id: Uuid,
    influencer_id: &str,
) -> Result<HashSet<String>, sqlx::Error> {
    let srcs: Vec<String> = sqlx::query_scalar(
        "SELECT image_src FROM scheduled_posts WHERE user_id = $1 AND influencer_id = $2 AND status = $3",
    )
    .bind(user_id)
    .bind(influencer_id)
    .bind(STATUS_SCHEDULED)
    .fetch_all(pool)
    .await?;
    Ok(srcs.into_iter().collect())
}

/// Returns the pair's quota phase anchor, seeding it on first use.
///
/// The seed is the earliest scheduled row's local date when one exists,
/// otherwise `fallback` (today's zone-local date). Written with
/// ON CONFLICT DO NOTHING and re-read, so concurrent first calls agree, and
/// the anchor is never recomputed afterwards.
pub async fn get_or_seed_anchor(
    pool: &PgPool,
    user_id: Uuid,
    influencer_id: &str,
    fallback: NaiveDate,
) -> Result<NaiveDate, sqlx::Error> {
    let existing: Option<NaiveDate> = sqlx::query_scalar(
        "SELECT anchor_date FROM schedule_anchors WHERE user_id = $1 AND influencer_id = $2",
    )
    .bind(user_id)
    .bind(influencer_id)
    .fetch_optional(pool)
    .await?;
    if let Some(anchor) = existing {
        return Ok(anchor);
    }

    let earliest: Option<NaiveDateTime> = sqlx::query_scalar(
        r#"
        SELECT schedule_date FROM scheduled_posts
        WHERE user_id = $1 AND influencer_id = $2 AND status = $3
        ORDER BY schedule_date ASC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(influencer_id)
    .bind(STATUS_SCHEDULED)
    .fetch_optional(pool)
    .await?;
    let seed = earliest.map(|dt| dt.date()).unwrap_or(fallback);

    sqlx::query(
        r#"
        INSERT INTO schedule_anchors (user_id, influencer_id, anchor_date)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, influencer_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(influencer_id)
    .bind(seed)
    .execute(pool)
    .await?;

    let committed: Option<NaiveDate> = sqlx::query_scalar(
        "SELECT anchor_date FROM schedule_anchors WHERE user_id = $1 AND influencer_id = $2",
    )
    .bind(user_id)
    .bind(influencer_id)
    .fetch_optional(pool)
    .await?;
    Ok(committed.unwrap_or(seed))
}

/// Persists staged rows with conflict-ignoring semantics.
/// Returns how many actually inserted (losers of a concurrent race are skipped).
pub async fn insert_staged(
    pool: &PgPool,
    user_id: Uuid,
    influencer_id: &str,
    label: &str,
    title: &str,
    staged: &[StagedPost],
) -> Result<u64, sqlx::Error> {
    let mut inserted = 0u64;
    for post in staged {
        let result = sqlx::query(
            r#"
            INSERT INTO scheduled_posts
                (user_id, influencer_id, image_src, schedule_date, time, status, label, title)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(influencer_id)
        .bind(&post.image_src)
        .bind(post.schedule_date)
        .bind(&post.time)
        .bind(STATUS_SCHEDULED)
        .bind(label)
        .bind(title)
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}
