use std::sync::Arc;

use sqlx::PgPool;

use crate::admin::privileges::AdminCache;
use crate::config::Config;
use crate::events::EventBus;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Live broadcast channel for admin events (exhaustion alerts, audit rows).
    pub events: EventBus,
    /// Admin privilege lookups cached for 60s; a revoked admin retains access
    /// for at most that window.
    pub admin_cache: Arc<AdminCache>,
}
