//! In-memory TTL cache for admin-privilege checks.
//!
//! Keyed by user id with a per-entry expiry. The 60s staleness window is an
//! accepted consistency tradeoff: a revoked admin retains access for at most
//! that long. Capacity is unbounded since the admin population is small.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use sqlx::PgPool;
use uuid::Uuid;

const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct CachedFlag {
    is_admin: bool,
    cached_at: Instant,
}

/// Time-indexed cache over `users.is_admin`.
pub struct AdminCache {
    ttl: Duration,
    entries: Mutex<HashMap<Uuid, CachedFlag>>,
}

impl AdminCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns whether the user is an admin, consulting the cache first.
    /// Unknown users resolve to false (and are cached as such).
    pub async fn is_admin(&self, pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
        if let Some(cached) = self.peek(user_id) {
            return Ok(cached);
        }

        let fresh: Option<bool> = sqlx::query_scalar("SELECT is_admin FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
        let is_admin = fresh.unwrap_or(false);

        self.store(user_id, is_admin);
        Ok(is_admin)
    }

    fn peek(&self, user_id: Uuid) -> Option<bool> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&user_id)
            .filter(|entry| entry.cached_at.elapsed() < self.ttl)
            .map(|entry| entry.is_admin)
    }

    fn store(&self, user_id: Uuid, is_admin: bool) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            user_id,
            CachedFlag {
                is_admin,
                cached_at: Instant::now(),
            },
        );
    }
}

impl Default for AdminCache {
    fn default() -> Self {
        Self::new()
    }
}
