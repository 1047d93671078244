use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CareerGoal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub target_role_id: Uuid,
    pub timeline_months: i32,
    pub title: Option<String>,
    /// Explicit selection. When no goal carries it, the newest goal is active.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Picks the goal that drives readiness: the explicitly active one, otherwise
/// the most recently created. Ties on `created_at` break on id so the choice
/// is stable across repository orderings.
pub fn select_active_goal(goals: &[CareerGoal]) -> Option<&CareerGoal> {
    goals
        .iter()
        .filter(|g| g.is_active)
        .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
        .or_else(|| {
            goals
                .iter()
                .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
        })
}

#[derive(Debug, Clone)]
pub struct NewCareerGoal {
    pub user_id: Uuid,
    pub target_role_id: Uuid,
    pub timeline_months: i32,
    pub title: Option<String>,
}

/// Partial update. `activate` moves the active flag to this goal and clears it
/// on the user's other goals, which are kept as history.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerGoalUpdate {
    pub target_role_id: Option<Uuid>,
    pub timeline_months: Option<i32>,
    pub title: Option<String>,
    #[serde(default)]
    pub activate: bool,
}
