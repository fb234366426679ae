use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Onboarding data consumed for display metadata and scheduling defaults.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OnboardingProfile {
    pub user_id: Uuid,
    pub niche: Option<String>,
    /// Preferred posting time as 24h "HH:MM".
    pub schedule_time: Option<String>,
    /// IANA zone name, e.g. "America/New_York".
    pub schedule_time_zone: Option<String>,
    pub plan: Option<String>,
    pub created_at: DateTime<Utc>,
}
