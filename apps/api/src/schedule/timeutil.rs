//! Time & quota utilities — zone-aware date keys, day indexing, per-plan
//! daily quota formulas, and preferred-time formatting.
//!
//! All date math goes through `chrono-tz` zone conversion so that calendar
//! dates are the ones the user observes locally, including across DST
//! transitions. Fixed UTC offsets are never used.
#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

// ────────────────────────────────────────────────────────────────────────────
// Plans
// ────────────────────────────────────────────────────────────────────────────

/// Subscription plan tier. Unknown strings resolve to `Basic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKey {
    Basic,
    Pro,
    Elite,
}

impl PlanKey {
    pub fn from_str(s: &str) -> Self {
        match s {
            "pro" => PlanKey::Pro,
            "elite" => PlanKey::Elite,
            _ => PlanKey::Basic,
        }
    }

    /// Posting cadence label shown on schedule rows.
    pub fn cadence_label(&self) -> &'static str {
        match self {
            PlanKey::Basic => "Every other day",
            PlanKey::Pro => "Twice daily",
            PlanKey::Elite => "Six times daily",
        }
    }

    /// Ordered default time-of-day slots for this plan.
    pub fn time_slots(&self) -> &'static [&'static str] {
        match self {
            PlanKey::Basic => &["10:00 AM"],
            PlanKey::Pro => &["10:00 AM", "6:00 PM"],
            PlanKey::Elite => &[
                "8:00 AM", "10:00 AM", "12:00 PM", "2:00 PM", "6:00 PM", "9:00 PM",
            ],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Zone-local date math
// ────────────────────────────────────────────────────────────────────────────

/// Calendar date of `instant` as observed in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Renders the zone-local calendar date of `instant` as "YYYY-MM-DD".
pub fn date_key_in_zone(instant: DateTime<Utc>, tz: Tz) -> String {
    date_key(local_date(instant, tz))
}

/// Renders an already-local date as "YYYY-MM-DD".
pub fn date_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Signed day count between two zone-local calendar dates; 0 = same local day.
pub fn day_index(anchor: DateTime<Utc>, target: DateTime<Utc>, tz: Tz) -> i64 {
    day_index_between(local_date(anchor, tz), local_date(target, tz))
}

/// Signed day count between two local dates.
pub fn day_index_between(anchor: NaiveDate, target: NaiveDate) -> i64 {
    (target - anchor).num_days()
}

// ────────────────────────────────────────────────────────────────────────────
// Quota
// ────────────────────────────────────────────────────────────────────────────

/// Number of posts allowed on the day at `day_index` (relative to the quota
/// anchor day).
///
/// Precedence: `override_daily`, then the `override_monthly` budget spread as
/// `floor(m/30)` per day with the remainder going to the earliest days of the
/// 30-day window, then the fixed per-plan formula (basic alternates days by
/// anchor parity; pro posts 2/day; elite posts 6/day).
pub fn daily_quota(
    plan: PlanKey,
    day_index: i64,
    override_daily: Option<i64>,
    override_monthly: Option<i64>,
) -> i64 {
    if let Some(daily) = override_daily {
        return daily.max(0);
    }
    if let Some(monthly) = override_monthly {
        let monthly = monthly.max(0);
        let base = monthly / 30;
        let remainder = monthly % 30;
        return base + i64::from(day_index < remainder);
    }
    match plan {
        PlanKey::Basic => i64::from(day_index % 2 == 0),
        PlanKey::Pro => 2,
        PlanKey::Elite => 6,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Time labels
// ────────────────────────────────────────────────────────────────────────────

/// Formats a 24h "HH:MM" preference as "h:mm AM/PM".
///
/// Out-of-range components are clamped (hour to 23, minute to 59); input that
/// does not parse at all falls through unchanged. Never fails.
pub fn format_preferred_time(raw: &str) -> String {
    let Some((hour_part, minute_part)) = raw.split_once(':') else {
        return raw.to_string();
    };
    let (Ok(hour), Ok(minute)) = (
        hour_part.trim().parse::<u32>(),
        minute_part.trim().parse::<u32>(),
    ) else {
        return raw.to_string();
    };

    let hour = hour.min(23);
    let minute = minute.min(59);
    let meridiem = if hour < 12 { "AM" } else { "PM" };
    let display_hour = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{display_hour}:{minute:02} {meridiem}")
}

/// Minutes-since-midnight sort key for a "h:mm AM/PM" label.
/// Labels that do not parse sort last.
pub fn display_time_sort_key(label: &str) -> u32 {
    let Some((clock, meridiem)) = label.split_once(' ') else {
        return u32::MAX;
    };
    let Some((hour_part, minute_part)) = clock.split_once(':') else {
        return u32::MAX;
    };
    let (Ok(hour), Ok(minute)) = (hour_part.parse::<u32>(), minute_part.parse::<u32>()) else {
        return u32::MAX;
    };
    if !(1..=12).contains(&hour) || minute > 59 {
        return u32::MAX;
    }
    let hour24 = match (hour % 12, meridiem) {
        (h, "PM") => h + 12,
        (h, "AM") => h,
        _ => return u32::MAX,
    };
    hour24 * 60 + minute
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
