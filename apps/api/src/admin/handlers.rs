//! Axum route handlers for the Admin API — override CRUD, bulk schedule
//! mutations, and the live event stream.
//!
//! Every mutating operation appends an `admin_actions` audit row and
//! broadcasts `actions.updated` on the EventBus.

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::account;
use crate::errors::AppError;
use crate::events::ACTIONS_UPDATED;
use crate::models::account::User;
use crate::models::schedule::{ScheduleOverrideRow, STATUS_CANCELLED, STATUS_SCHEDULED};
use crate::schedule::handlers::is_valid_influencer_id;
use crate::schedule::store;
use crate::schedule::timeutil::format_preferred_time;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOverrideRequest {
    pub user_id: Option<Uuid>,
    pub influencer_id: Option<String>,
    pub disabled: Option<bool>,
    pub paused: Option<bool>,
    pub override_daily: Option<i32>,
    pub override_monthly: Option<i32>,
    pub override_time: Option<String>,
    pub override_time_zone: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOverridesQuery {
    pub user_id: Option<Uuid>,
    pub influencer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRescheduleRequest {
    pub user_id: Uuid,
    pub influencer_id: Option<String>,
    /// Days to shift each row's schedule_date by (may be negative).
    pub shift_days: Option<i32>,
    /// New time label in 24h "HH:MM"; absent keeps each row's original time.
    pub set_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCancelRequest {
    pub user_id: Uuid,
    pub influencer_id: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkMutationResponse {
    pub affected: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/admin/overrides
///
/// Creates an override at any specificity tier. Rows are never mutated;
/// newer rows of the same tier supersede older ones at resolution time.
pub async fn handle_create_override(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateOverrideRequest>,
) -> Result<(StatusCode, Json<ScheduleOverrideRow>), AppError> {
    let admin = require_admin(&state, &headers).await?;

    if let Some(ref influencer_id) = request.influencer_id {
        if !is_valid_influencer_id(influencer_id) {
            return Err(AppError::Validation(format!(
                "Invalid influencer id '{influencer_id}'"
            )));
        }
        if !store::influencer_exists(&state.db, influencer_id).await? {
            return Err(AppError::NotFound(format!(
                "Influencer '{influencer_id}' is not registered"
            )));
        }
    }

    let row = sqlx::query_as::<_, ScheduleOverrideRow>(
        r#"
        INSERT INTO schedule_overrides
            (user_id, influencer_id, disabled, paused, override_daily,
             override_monthly, override_time, override_time_zone, reason)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *
        "#,
    )
    .bind(request.user_id)
    .bind(&request.influencer_id)
    .bind(request.disabled.unwrap_or(false))
    .bind(request.paused.unwrap_or(false))
    .bind(request.override_daily)
    .bind(request.override_monthly)
    .bind(&request.override_time)
    .bind(&request.override_time_zone)
    .bind(&request.reason)
    .fetch_one(&state.db)
    .await?;

    record_action(
        &state,
        request.user_id.unwrap_or(admin.id),
        "schedule.override.created",
        json!({
            "overrideId": row.id,
            "adminId": admin.id,
            "userId": row.user_id,
            "influencerId": row.influencer_id,
            "disabled": row.disabled,
            "paused": row.paused,
        }),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(row)))
}

/// GET /api/v1/admin/overrides
///
/// Lists overrides, optionally filtered by user and/or influencer, newest first.
pub async fn handle_list_overrides(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListOverridesQuery>,
) -> Result<Json<Vec<ScheduleOverrideRow>>, AppError> {
    require_admin(&state, &headers).await?;

    let rows = sqlx::query_as::<_, ScheduleOverrideRow>(
        r#"
        SELECT * FROM schedule_overrides
        WHERE ($1::uuid IS NULL OR user_id = $1)
          AND ($2::text IS NULL OR influencer_id = $2)
        ORDER BY created_at DESC
        "#,
    )
    .bind(query.user_id)
    .bind(&query.influencer_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rows))
}

/// POST /api/v1/admin/schedule/reschedule
///
/// Bulk-shifts a user's (optionally influencer-scoped) scheduled rows by N
/// days and/or overwrites their time. Cancelled rows are untouched; without
/// `setTime` each row keeps its original time.
pub async fn handle_bulk_reschedule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BulkRescheduleRequest>,
) -> Result<Json<BulkMutationResponse>, AppError> {
    let admin = require_admin(&state, &headers).await?;

    let shift_days = request.shift_days.unwrap_or(0);
    let set_time = request.set_time.as_deref().map(format_preferred_time);

    let result = sqlx::query(
        r#"
        UPDATE scheduled_posts
        SET schedule_date = schedule_date + make_interval(days => $3),
            time = COALESCE($4, time)
        WHERE user_id = $1 AND status = $5
          AND ($2::text IS NULL OR influencer_id = $2)
        "#,
    )
    .bind(request.user_id)
    .bind(&request.influencer_id)
    .bind(shift_days)
    .bind(&set_time)
    .bind(STATUS_SCHEDULED)
    .execute(&state.db)
    .await?;

    let affected = result.rows_affected();
    record_action(
        &state,
        request.user_id,
        "schedule.rescheduled",
        json!({
            "adminId": admin.id,
            "userId": request.user_id,
            "influencerId": request.influencer_id,
            "shiftDays": shift_days,
            "setTime": set_time,
            "affected": affected,
        }),
    )
    .await?;

    Ok(Json(BulkMutationResponse { affected }))
}

/// POST /api/v1/admin/schedule/cancel
///
/// Bulk-cancels scheduled rows, stamping who/when/why. Rows are retained for
/// audit rather than deleted.
pub async fn handle_bulk_cancel(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<BulkCancelRequest>,
) -> Result<Json<BulkMutationResponse>, AppError> {
    let admin = require_admin(&state, &headers).await?;

    let result = sqlx::query(
        r#"
        UPDATE scheduled_posts
        SET status = $6, cancelled_at = NOW(), cancelled_by = $3, admin_note = $4
        WHERE user_id = $1 AND status = $5
          AND ($2::text IS NULL OR influencer_id = $2)
        "#,
    )
    .bind(request.user_id)
    .bind(&request.influencer_id)
    .bind(admin.id)
    .bind(&request.note)
    .bind(STATUS_SCHEDULED)
    .bind(STATUS_CANCELLED)
    .execute(&state.db)
    .await?;

    let affected = result.rows_affected();
    record_action(
        &state,
        request.user_id,
        "schedule.cancelled",
        json!({
            "adminId": admin.id,
            "userId": request.user_id,
            "influencerId": request.influencer_id,
            "note": request.note,
            "affected": affected,
        }),
    )
    .await?;

    Ok(Json(BulkMutationResponse { affected }))
}

/// GET /api/v1/admin/events
///
/// Server-sent event stream of EventBus publishes. Advisory only: events
/// published before the subscription are not replayed.
pub async fn handle_admin_events(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    require_admin(&state, &headers).await?;

    let receiver = state.events.subscribe();
    let stream = BroadcastStream::new(receiver).filter_map(|event| {
        // A lagged receiver drops the missed events and keeps streaming.
        event
            .ok()
            .and_then(|ev| Event::default().event(ev.event_type).json_data(&ev.payload).ok())
            .map(Ok)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

/// Resolves the current user and checks admin privilege (60s-cached).
async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<User, AppError> {
    let user = account::current_user(&state.db, headers)
        .await?
        .ok_or(AppError::Unauthorized)?;
    if !state.admin_cache.is_admin(&state.db, user.id).await? {
        return Err(AppError::Forbidden);
    }
    Ok(user)
}

/// Appends an audit action row and broadcasts `actions.updated`.
async fn record_action(
    state: &AppState,
    user_id: Uuid,
    action: &str,
    detail: Value,
) -> Result<(), AppError> {
    sqlx::query("INSERT INTO admin_actions (user_id, action, detail) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(action)
        .bind(&detail)
        .execute(&state.db)
        .await?;

    state.events.publish(ACTIONS_UPDATED, detail);
    Ok(())
}
