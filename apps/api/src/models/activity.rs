use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const ACTIVITY_SKILL_UPDATED: &str = "skill_updated";
pub const ACTIVITY_GOAL_SET: &str = "goal_set";
pub const ACTIVITY_GOAL_UPDATED: &str = "goal_updated";
pub const ACTIVITY_PROGRESS: &str = "progress";
pub const ACTIVITY_PROGRESS_REMOVED: &str = "progress_removed";
pub const ACTIVITY_PATH_GENERATED: &str = "path_generated";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}
