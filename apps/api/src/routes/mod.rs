pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::admin::handlers as admin_handlers;
use crate::schedule::handlers as schedule_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Schedule API
        .route(
            "/api/v1/schedule",
            get(schedule_handlers::handle_get_schedule),
        )
        // Admin API
        .route(
            "/api/v1/admin/overrides",
            post(admin_handlers::handle_create_override).get(admin_handlers::handle_list_overrides),
        )
        .route(
            "/api/v1/admin/schedule/reschedule",
            post(admin_handlers::handle_bulk_reschedule),
        )
        .route(
            "/api/v1/admin/schedule/cancel",
            post(admin_handlers::handle_bulk_cancel),
        )
        .route(
            "/api/v1/admin/events",
            get(admin_handlers::handle_admin_events),
        )
        .with_state(state)
}
