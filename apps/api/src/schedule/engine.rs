//! Allocation engine — fills a requested schedule window with image posts.
//!
//! The allocation loop (`plan_allocation`) and window reconciliation
//! (`reconcile_window`) are pure functions over pre-loaded state;
//! `allocate_window` orchestrates the I/O around them. The engine holds no
//! cross-call state: every invocation recomputes from persisted truth, and
//! conflict-ignoring inserts plus the post-write re-read make repeated or
//! concurrent calls converge on the same window instead of duplicating rows.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::account;
use crate::errors::AppError;
use crate::events::EventBus;
use crate::models::schedule::{ScheduleOverrideRow, ScheduledPostRow};
use crate::schedule::exhaustion;
use crate::schedule::inventory;
use crate::schedule::overrides;
use crate::schedule::store;
use crate::schedule::timeutil::{
    daily_quota, date_key, date_key_in_zone, day_index_between, display_time_sort_key,
    format_preferred_time, local_date, PlanKey,
};

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Why a window is (partially) empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExhaustionReason {
    NoImages,
    AdminDisabled,
    Exhausted,
}

/// One scheduled post in the response window.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledItem {
    pub id: Uuid,
    pub time: String,
    pub label: String,
    pub title: String,
    pub src: String,
    pub date_key: String,
    pub schedule_date: NaiveDateTime,
}

/// Reconciled window returned to the caller.
#[derive(Debug, Serialize)]
pub struct ScheduleOutcome {
    pub items: Vec<ScheduledItem>,
    pub exhausted: bool,
    pub reason: Option<ExhaustionReason>,
    pub remaining: i64,
}

impl ScheduleOutcome {
    /// "Nothing to show" result for unauthenticated or unknown-influencer
    /// requests; not an exhaustion state.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            exhausted: false,
            reason: None,
            remaining: 0,
        }
    }
}

/// Quota for one local day of the requested window.
#[derive(Debug, Clone)]
pub struct DayQuota {
    pub date: NaiveDate,
    pub date_key: String,
    pub quota: i64,
}

/// A row the allocation loop wants persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedPost {
    pub image_src: String,
    pub schedule_date: NaiveDateTime,
    pub date_key: String,
    pub time: String,
}

/// Result of the pure allocation pass.
#[derive(Debug)]
pub struct AllocationPlan {
    pub staged: Vec<StagedPost>,
    /// True when an image was needed but none remained.
    pub ran_dry: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Pure core
// ────────────────────────────────────────────────────────────────────────────

/// Composes the effective slot list: the plan's slots with the formatted
/// preferred time prepended (deduplicated) when one is set.
pub fn effective_time_slots(plan: PlanKey, preferred: Option<&str>) -> Vec<String> {
    let mut slots: Vec<String> = plan.time_slots().iter().map(|s| s.to_string()).collect();
    if let Some(raw) = preferred {
        let formatted = format_preferred_time(raw);
        slots.retain(|s| s != &formatted);
        slots.insert(0, formatted);
    }
    slots
}

/// Computes each window day's quota from its day-index relative to the anchor.
///
/// The anchor is fixed per (user, influencer), so the basic plan's alternate-day
/// parity and the monthly-budget remainder distribution stay phase-stable no
/// matter when the window is requested.
pub fn window_day_quotas(
    start: NaiveDate,
    days: i64,
    anchor: NaiveDate,
    plan: PlanKey,
    override_daily: Option<i64>,
    override_monthly: Option<i64>,
) -> Vec<DayQuota> {
    (0..days.max(0))
        .map(|offset| {
            let date = start + Days::new(offset as u64);
            let quota = daily_quota(
                plan,
                day_index_between(anchor, date),
                override_daily,
                override_monthly,
            );
            DayQuota {
                date,
                date_key: date_key(date),
                quota,
            }
        })
        .collect()
}

/// Key identifying an occupied (day, time) slot.
pub fn slot_key(date_key: &str, time: &str) -> String {
    format!("{date_key}@{time}")
}

/// The allocation loop: walks the window day by day, slot by slot, skipping
/// slots that already have a persisted row and consuming unconsumed images in
/// inventory order for the rest.
///
/// When images run out mid-window the pass stops staging — it never allocates
/// past the point of exhaustion — and reports `ran_dry`.
pub fn plan_allocation(
    day_quotas: &[DayQuota],
    slots: &[String],
    unconsumed: &[String],
    occupied: &HashSet<String>,
) -> AllocationPlan {
    let mut images = unconsumed.iter();
    let mut staged = Vec::new();
    let mut ran_dry = false;

    'days: for day in day_quotas {
        if day.quota <= 0 {
            continue;
        }
        for slot in 0..day.quota {
            let time = &slots[(slot as usize) % slots.len()];
            if occupied.contains(&slot_key(&day.date_key, time)) {
                continue; // already allocated on an earlier call
            }
            let Some(src) = images.next() else {
                ran_dry = true;
                break 'days;
            };
            staged.push(StagedPost {
                image_src: src.clone(),
                schedule_date: day.date.and_time(NaiveTime::MIN),
                date_key: day.date_key.clone(),
                time: time.clone(),
            });
        }
    }

    AllocationPlan { staged, ran_dry }
}

/// Shapes the post-write rows into the response: day-then-time order, with
/// each day capped at its quota (guards against pre-existing overflow from
/// manual admin edits).
pub fn reconcile_window(
    rows: &[ScheduledPostRow],
    day_quotas: &[DayQuota],
) -> Vec<ScheduledItem> {
    let mut items = Vec::new();
    for day in day_quotas {
        if day.quota <= 0 {
            continue;
        }
        let mut day_rows: Vec<&ScheduledPostRow> = rows
            .iter()
            .filter(|r| r.schedule_date.date() == day.date)
            .collect();
        day_rows.sort_by_key(|r| display_time_sort_key(&r.time));
        for row in day_rows.into_iter().take(day.quota as usize) {
            items.push(ScheduledItem {
                id: row.id,
                time: row.time.clone(),
                label: row.label.clone(),
                title: row.title.clone(),
                src: row.image_src.clone(),
                date_key: day.date_key.clone(),
                schedule_date: row.schedule_date,
            });
        }
    }
    items
}

// ────────────────────────────────────────────────────────────────────────────
// Orchestration
// ────────────────────────────────────────────────────────────────────────────

/// Computes, persists, and returns the schedule window for a user+influencer
/// pair. Safe to call repeatedly and concurrently; see the module docs.
pub async fn allocate_window(
    pool: &PgPool,
    events: &EventBus,
    assets_root: &Path,
    user_id: Uuid,
    influencer_id: &str,
    days: i64,
    now: DateTime<Utc>,
) -> Result<ScheduleOutcome, AppError> {
    let days = days.clamp(1, 31);

    // 1–2. Plan, then the most specific admin override. A disabled match
    // short-circuits before any inventory or window I/O.
    let plan = account::resolve_plan(pool, user_id).await?;
    let override_rows = overrides::load_overrides(pool, user_id, influencer_id).await?;
    let active = overrides::resolve_override(user_id, influencer_id, &override_rows);

    if active.is_some_and(|o| o.disabled) {
        exhaustion::maybe_notify_exhausted(
            pool,
            events,
            user_id,
            influencer_id,
            "schedule generation disabled by admin override",
        )
        .await;
        return Ok(ScheduleOutcome {
            items: Vec::new(),
            exhausted: true,
            reason: Some(ExhaustionReason::AdminDisabled),
            remaining: 0,
        });
    }

    // 3. Effective timezone, preferred time, and slot list.
    let profile = account::get_profile(pool, user_id).await?;
    let tz = effective_timezone(active, profile.as_ref().and_then(|p| p.schedule_time_zone.as_deref()));
    let preferred = active
        .and_then(|o| o.override_time.as_deref())
        .or(profile.as_ref().and_then(|p| p.schedule_time.as_deref()));
    let slots = effective_time_slots(plan, preferred);

    let label = plan.cadence_label().to_string();
    let title = profile
        .as_ref()
        .and_then(|p| p.niche.as_deref())
        .map(|niche| format!("{niche} post"))
        .unwrap_or_else(|| "Scheduled post".to_string());

    // 4. Load inventory and persisted truth.
    tracing::debug!(
        "Allocating {days}-day window from {} for user {user_id} influencer {influencer_id}",
        date_key_in_zone(now, tz)
    );
    let start = local_date(now, tz);
    let window_from = start.and_time(NaiveTime::MIN);
    let window_to = (start + Days::new(days as u64)).and_time(NaiveTime::MIN);

    let images = inventory::list_available_images(assets_root, influencer_id).await?;
    let used = store::used_image_srcs(pool, user_id, influencer_id).await?;
    let existing = store::scheduled_in_window(pool, user_id, influencer_id, window_from, window_to)
        .await?;
    let anchor = store::get_or_seed_anchor(pool, user_id, influencer_id, start).await?;

    // 5. Unconsumed inventory; empty means no-images exhaustion.
    let unconsumed = inventory::available_unconsumed(&images, &used);
    let no_images = unconsumed.is_empty();

    // 6. The allocation pass.
    let override_daily = active.and_then(|o| o.override_daily).map(i64::from);
    let override_monthly = active.and_then(|o| o.override_monthly).map(i64::from);
    let day_quotas =
        window_day_quotas(start, days, anchor, plan, override_daily, override_monthly);
    let occupied: HashSet<String> = existing
        .iter()
        .map(|r| slot_key(&date_key(r.schedule_date.date()), &r.time))
        .collect();
    let allocation = plan_allocation(&day_quotas, &slots, &unconsumed, &occupied);
    let mut exhausted = no_images || allocation.ran_dry;

    // 7. Persist, unless the override pauses this pair (dry-run).
    let paused = active.is_some_and(|o| o.paused);
    if !allocation.staged.is_empty() && !paused {
        let inserted = store::insert_staged(
            pool,
            user_id,
            influencer_id,
            &label,
            &title,
            &allocation.staged,
        )
        .await?;
        tracing::debug!(
            "Allocated {inserted}/{} rows for user {user_id} influencer {influencer_id}",
            allocation.staged.len()
        );
    }

    // 8–9. Re-read committed truth and shape the response window.
    let final_rows =
        store::scheduled_in_window(pool, user_id, influencer_id, window_from, window_to).await?;
    let items = reconcile_window(&final_rows, &day_quotas);

    // 10. Remaining inventory after this call's consumption.
    let consumed = allocation.staged.len() as i64;
    let remaining = (unconsumed.len() as i64 - consumed).max(0);
    if remaining == 0 {
        exhausted = true;
    }

    let reason = if exhausted {
        Some(if no_images {
            ExhaustionReason::NoImages
        } else {
            ExhaustionReason::Exhausted
        })
    } else {
        None
    };

    if exhausted && items.is_empty() {
        let detail = match reason {
            Some(ExhaustionReason::NoImages) => "no inventory images are available",
            _ => "inventory exhausted before any post could be scheduled",
        };
        exhaustion::maybe_notify_exhausted(pool, events, user_id, influencer_id, detail).await;
    }

    Ok(ScheduleOutcome {
        items,
        exhausted,
        reason,
        remaining,
    })
}

/// Override zone, else the user's stored zone, else UTC. Unparseable IANA
/// names also fall back to UTC rather than failing the request.
fn effective_timezone(active: Option<&ScheduleOverrideRow>, profile_zone: Option<&str>) -> Tz {
    active
        .and_then(|o| o.override_time_zone.as_deref())
        .or(profile_zone)
        .and_then(|name| name.parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn srcs(names: &[&str]) -> Vec<String> {
        names
            .iter()
            .map(|n| format!("/assets/influencers/ava-sky/{n}"))
            .collect()
    }

    fn make_row(date: NaiveDate, time: &str, src: &str) -> ScheduledPostRow {
        ScheduledPostRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            influencer_id: "ava-sky".to_string(),
            image_src: src.to_string(),
            schedule_date: date.and_time(NaiveTime::MIN),
            time: time.to_string(),
            status: "scheduled".to_string(),
            cancelled_at: None,
            cancelled_by: None,
            admin_note: None,
            label: "Twice daily".to_string(),
            title: "fitness post".to_string(),
            created_at: Utc::now(),
        }
    }

    fn occupied_from(staged: &[StagedPost]) -> HashSet<String> {
        staged
            .iter()
            .map(|p| slot_key(&p.date_key, &p.time))
            .collect()
    }

    // ── effective slots ──────────────────────────────────────────────────────

    #[test]
    fn test_preferred_time_prepended_and_formatted() {
        let slots = effective_time_slots(PlanKey::Pro, Some("14:30"));
        assert_eq!(slots, vec!["2:30 PM", "10:00 AM", "6:00 PM"]);
    }

    #[test]
    fn test_preferred_time_deduplicated_when_already_a_slot() {
        let slots = effective_time_slots(PlanKey::Pro, Some("10:00"));
        assert_eq!(slots, vec!["10:00 AM", "6:00 PM"]);
    }

    #[test]
    fn test_no_preference_keeps_plan_slots() {
        let slots = effective_time_slots(PlanKey::Basic, None);
        assert_eq!(slots, vec!["10:00 AM"]);
    }

    // ── window quotas ────────────────────────────────────────────────────────

    #[test]
    fn test_basic_plan_window_alternates_from_anchor() {
        let quotas = window_day_quotas(
            ymd(2025, 6, 1),
            7,
            ymd(2025, 6, 1),
            PlanKey::Basic,
            None,
            None,
        );
        let pattern: Vec<i64> = quotas.iter().map(|d| d.quota).collect();
        assert_eq!(pattern, vec![1, 0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_basic_plan_phase_is_anchor_stable_across_window_starts() {
        // Same anchor, window starting three days later: the parity pattern
        // continues rather than resetting at the new "today".
        let anchor = ymd(2025, 6, 1);
        let shifted = window_day_quotas(ymd(2025, 6, 4), 7, anchor, PlanKey::Basic, None, None);
        let pattern: Vec<i64> = shifted.iter().map(|d| d.quota).collect();
        assert_eq!(pattern, vec![0, 1, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_monthly_override_window_sums_to_budget() {
        let quotas = window_day_quotas(
            ymd(2025, 6, 1),
            30,
            ymd(2025, 6, 1),
            PlanKey::Pro,
            None,
            Some(62),
        );
        let total: i64 = quotas.iter().map(|d| d.quota).sum();
        assert_eq!(total, 62);
        assert_eq!(quotas[0].quota, 3, "remainder lands on the earliest days");
        assert_eq!(quotas[1].quota, 3);
        assert_eq!(quotas[2].quota, 2);
    }

    // ── allocation pass ──────────────────────────────────────────────────────

    #[test]
    fn test_allocation_fills_window_in_inventory_order() {
        let quotas = window_day_quotas(
            ymd(2025, 6, 1),
            2,
            ymd(2025, 6, 1),
            PlanKey::Pro,
            None,
            None,
        );
        let slots = effective_time_slots(PlanKey::Pro, None);
        let images = srcs(&["a.png", "b.png", "c.png", "d.png"]);

        let plan = plan_allocation(&quotas, &slots, &images, &HashSet::new());
        assert!(!plan.ran_dry);
        assert_eq!(plan.staged.len(), 4);
        assert_eq!(plan.staged[0].image_src, images[0]);
        assert_eq!(plan.staged[0].time, "10:00 AM");
        assert_eq!(plan.staged[1].time, "6:00 PM");
        assert_eq!(plan.staged[2].date_key, "2025-06-02");
    }

    #[test]
    fn test_allocation_is_idempotent_once_persisted() {
        let quotas = window_day_quotas(
            ymd(2025, 6, 1),
            3,
            ymd(2025, 6, 1),
            PlanKey::Pro,
            None,
            None,
        );
        let slots = effective_time_slots(PlanKey::Pro, None);
        let images = srcs(&["a.png", "b.png", "c.png", "d.png", "e.png", "f.png"]);

        let first = plan_allocation(&quotas, &slots, &images, &HashSet::new());
        assert_eq!(first.staged.len(), 6);

        // Second pass sees the first pass's rows as occupied and its images as
        // consumed: nothing new must be staged.
        let occupied = occupied_from(&first.staged);
        let second = plan_allocation(&quotas, &slots, &[], &occupied);
        assert!(second.staged.is_empty(), "repeat call must not re-allocate");
    }

    #[test]
    fn test_allocation_stops_at_image_exhaustion() {
        let quotas = window_day_quotas(
            ymd(2025, 6, 1),
            3,
            ymd(2025, 6, 1),
            PlanKey::Pro,
            None,
            None,
        );
        let slots = effective_time_slots(PlanKey::Pro, None);
        let images = srcs(&["a.png", "b.png", "c.png"]);

        let plan = plan_allocation(&quotas, &slots, &images, &HashSet::new());
        assert!(plan.ran_dry);
        assert_eq!(plan.staged.len(), 3, "exactly the inventory size");
        assert_eq!(
            plan.staged[2].date_key, "2025-06-02",
            "allocation must not continue past exhaustion"
        );
    }

    #[test]
    fn test_allocation_skips_occupied_slots_without_consuming_images() {
        let quotas = window_day_quotas(
            ymd(2025, 6, 1),
            1,
            ymd(2025, 6, 1),
            PlanKey::Pro,
            None,
            None,
        );
        let slots = effective_time_slots(PlanKey::Pro, None);
        let images = srcs(&["a.png"]);
        let occupied: HashSet<String> = [slot_key("2025-06-01", "10:00 AM")].into_iter().collect();

        let plan = plan_allocation(&quotas, &slots, &images, &occupied);
        assert_eq!(plan.staged.len(), 1);
        assert_eq!(plan.staged[0].time, "6:00 PM");
        assert_eq!(plan.staged[0].image_src, images[0]);
        assert!(!plan.ran_dry);
    }

    #[test]
    fn test_allocation_skips_zero_quota_days() {
        let quotas = window_day_quotas(
            ymd(2025, 6, 1),
            4,
            ymd(2025, 6, 1),
            PlanKey::Basic,
            None,
            None,
        );
        let slots = effective_time_slots(PlanKey::Basic, None);
        let images = srcs(&["a.png", "b.png", "c.png"]);

        let plan = plan_allocation(&quotas, &slots, &images, &HashSet::new());
        let dates: Vec<&str> = plan.staged.iter().map(|p| p.date_key.as_str()).collect();
        assert_eq!(dates, vec!["2025-06-01", "2025-06-03"]);
    }

    #[test]
    fn test_preferred_time_leads_every_day() {
        let quotas = window_day_quotas(
            ymd(2025, 6, 1),
            3,
            ymd(2025, 6, 1),
            PlanKey::Pro,
            None,
            None,
        );
        let slots = effective_time_slots(PlanKey::Pro, Some("14:30"));
        let images = srcs(&["a.png", "b.png", "c.png", "d.png", "e.png", "f.png"]);

        let plan = plan_allocation(&quotas, &slots, &images, &HashSet::new());
        for day_key in ["2025-06-01", "2025-06-02", "2025-06-03"] {
            let first = plan
                .staged
                .iter()
                .find(|p| p.date_key == day_key)
                .expect("day allocated");
            assert_eq!(first.time, "2:30 PM", "override time leads day {day_key}");
        }
    }

    // ── reconciliation ───────────────────────────────────────────────────────

    #[test]
    fn test_reconcile_orders_day_then_time() {
        let quotas = window_day_quotas(
            ymd(2025, 6, 1),
            2,
            ymd(2025, 6, 1),
            PlanKey::Pro,
            None,
            None,
        );
        let rows = vec![
            make_row(ymd(2025, 6, 2), "10:00 AM", "c.png"),
            make_row(ymd(2025, 6, 1), "6:00 PM", "b.png"),
            make_row(ymd(2025, 6, 1), "10:00 AM", "a.png"),
        ];

        let items = reconcile_window(&rows, &quotas);
        let order: Vec<(&str, &str)> = items
            .iter()
            .map(|i| (i.date_key.as_str(), i.time.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("2025-06-01", "10:00 AM"),
                ("2025-06-01", "6:00 PM"),
                ("2025-06-02", "10:00 AM"),
            ]
        );
    }

    #[test]
    fn test_reconcile_caps_overflowing_days_at_quota() {
        // Manual admin edits may have left more rows than the quota allows;
        // only the earliest `quota` rows of the day are returned.
        let quotas = window_day_quotas(
            ymd(2025, 6, 1),
            1,
            ymd(2025, 6, 1),
            PlanKey::Pro,
            None,
            None,
        );
        let rows = vec![
            make_row(ymd(2025, 6, 1), "9:00 PM", "late.png"),
            make_row(ymd(2025, 6, 1), "8:00 AM", "early.png"),
            make_row(ymd(2025, 6, 1), "12:00 PM", "noon.png"),
        ];

        let items = reconcile_window(&rows, &quotas);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].time, "8:00 AM");
        assert_eq!(items[1].time, "12:00 PM");
    }

    #[test]
    fn test_reconcile_drops_rows_on_zero_quota_days() {
        let quotas = window_day_quotas(
            ymd(2025, 6, 1),
            2,
            ymd(2025, 6, 1),
            PlanKey::Basic,
            None,
            None,
        );
        // 2025-06-02 has day-index 1 → quota 0 on basic.
        let rows = vec![make_row(ymd(2025, 6, 2), "10:00 AM", "a.png")];
        assert!(reconcile_window(&rows, &quotas).is_empty());
    }

    // ── timezone fallback ────────────────────────────────────────────────────

    #[test]
    fn test_effective_timezone_fallback_chain() {
        let mut row = ScheduleOverrideRow {
            id: Uuid::new_v4(),
            user_id: None,
            influencer_id: None,
            disabled: false,
            paused: false,
            override_daily: None,
            override_monthly: None,
            override_time: None,
            override_time_zone: Some("Asia/Tokyo".to_string()),
            reason: None,
            created_at: Utc::now() - Duration::hours(1),
        };
        assert_eq!(
            effective_timezone(Some(&row), Some("America/New_York")),
            chrono_tz::Asia::Tokyo
        );

        row.override_time_zone = None;
        assert_eq!(
            effective_timezone(Some(&row), Some("America/New_York")),
            chrono_tz::America::New_York
        );
        assert_eq!(effective_timezone(Some(&row), None), Tz::UTC);
        assert_eq!(
            effective_timezone(None, Some("Not/AZone")),
            Tz::UTC,
            "unparseable IANA names fall back to UTC"
        );
    }
}
