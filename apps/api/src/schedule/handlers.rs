//! Axum route handlers for the Schedule API.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::Deserialize;

use crate::account;
use crate::errors::AppError;
use crate::schedule::engine::{allocate_window, ScheduleOutcome};
use crate::schedule::store;
use crate::state::AppState;

const DEFAULT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    pub influencer_id: String,
    pub days: Option<i64>,
}

/// GET /api/v1/schedule
///
/// Returns the reconciled schedule window for the current user and the
/// requested influencer, allocating any missing rows along the way.
/// Unauthenticated requests and unknown influencers get an empty,
/// non-exhausted window ("nothing to show"), not an error.
pub async fn handle_get_schedule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<ScheduleOutcome>, AppError> {
    let Some(user) = account::current_user(&state.db, &headers).await? else {
        return Ok(Json(ScheduleOutcome::empty()));
    };

    if !is_valid_influencer_id(&query.influencer_id) {
        return Ok(Json(ScheduleOutcome::empty()));
    }
    if !store::influencer_exists(&state.db, &query.influencer_id).await? {
        return Ok(Json(ScheduleOutcome::empty()));
    }

    let days = query.days.unwrap_or(DEFAULT_WINDOW_DAYS).clamp(1, 31);

    let outcome = allocate_window(
        &state.db,
        &state.events,
        &state.config.assets_root,
        user.id,
        &query.influencer_id,
        days,
        Utc::now(),
    )
    .await?;

    Ok(Json(outcome))
}

/// Influencer slugs are lowercase alphanumerics and hyphens.
pub fn is_valid_influencer_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
