use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const STATUS_SCHEDULED: &str = "scheduled";
pub const STATUS_CANCELLED: &str = "cancelled";

/// A persisted scheduled post.
///
/// `schedule_date` is a timezone-naive instant at local midnight of the target
/// day, in the user's effective zone at the time the row was written.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledPostRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub influencer_id: String,
    pub image_src: String,
    pub schedule_date: NaiveDateTime,
    /// Formatted local time label, e.g. "10:00 AM".
    pub time: String,
    pub status: String,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub admin_note: Option<String>,
    pub label: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Admin-authored scheduling policy. Rows are immutable once created; newer
/// rows supersede older ones of the same specificity.
///
/// Nullability of `user_id`/`influencer_id` encodes specificity: both set is
/// the most specific match, both null is the global default.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleOverrideRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub influencer_id: Option<String>,
    /// No new schedule rows are ever generated for the match.
    pub disabled: bool,
    /// Computed rows are not persisted (dry-run); quota math still runs.
    pub paused: bool,
    pub override_daily: Option<i32>,
    pub override_monthly: Option<i32>,
    /// Preferred posting time as 24h "HH:MM".
    pub override_time: Option<String>,
    pub override_time_zone: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}
