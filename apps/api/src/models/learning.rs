use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const RESOURCE_COURSE: &str = "course";
pub const RESOURCE_WORKSHOP: &str = "workshop";
pub const RESOURCE_ASSESSMENT: &str = "assessment";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LearningResource {
    pub id: Uuid,
    pub title: String,
    /// "course" | "workshop" | "assessment" | anything else the catalog carries.
    pub resource_type: String,
    pub duration_minutes: i32,
    /// Skill the resource trains, if the catalog links one.
    pub skill_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub resource_id: Uuid,
    pub progress: i32,
    pub completed: bool,
    pub score: Option<i32>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl UserProgress {
    pub fn status(&self) -> ProgressStatus {
        if self.completed {
            ProgressStatus::Completed
        } else if self.progress > 0 {
            ProgressStatus::InProgress
        } else {
            ProgressStatus::NotStarted
        }
    }
}

/// The values to persist for a progress report, after transition checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressWrite {
    pub progress: i32,
    pub completed: bool,
    pub score: Option<i32>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Validates a progress report against the stored entry.
///
/// Progress only moves forward; going back requires an explicit removal.
/// Reaching 100 completes the entry, and a completed entry stays completed.
/// An omitted score keeps the previously recorded one.
pub fn plan_progress_write(
    existing: Option<&UserProgress>,
    progress: i32,
    score: Option<i32>,
    now: DateTime<Utc>,
) -> Result<ProgressWrite, String> {
    if let Some(prev) = existing {
        if progress < prev.progress {
            return Err(format!(
                "progress cannot decrease from {} to {progress}; remove the progress entry to restart",
                prev.progress
            ));
        }
    }

    let already_completed = existing.map(|p| p.completed).unwrap_or(false);
    let completed = already_completed || progress >= 100;
    let completed_at = match existing.and_then(|p| p.completed_at) {
        Some(at) => Some(at),
        None if completed => Some(now),
        None => None,
    };

    Ok(ProgressWrite {
        progress,
        completed,
        score: score.or_else(|| existing.and_then(|p| p.score)),
        completed_at,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathResource {
    pub resource_id: Uuid,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathModule {
    pub title: String,
    pub resources: Vec<PathResource>,
}

/// Persisted learning path. Regenerated as a whole, never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPath {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub target_role_id: Option<Uuid>,
    pub modules: Vec<PathModule>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl LearningPath {
    pub fn total_resources(&self) -> usize {
        self.modules.iter().map(|m| m.resources.len()).sum()
    }
}

#[derive(Debug, Clone)]
pub struct NewLearningPath {
    pub user_id: Uuid,
    pub title: String,
    pub target_role_id: Option<Uuid>,
    pub modules: Vec<PathModule>,
}
