//! Repository seam over the skill/progress records.
//!
//! Every lookup returns `Ok(None)` (or an empty list) for missing rows. `Err`
//! is reserved for transport and storage failures, which are the only errors
//! the readiness engine lets through to callers.

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::models::activity::Activity;
use crate::models::career::{CareerGoal, CareerGoalUpdate, NewCareerGoal};
use crate::models::learning::{
    LearningPath, LearningResource, NewLearningPath, ProgressWrite, UserProgress,
};
use crate::models::skill::{Role, Skill, UserSkill};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgSkillStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored data is malformed: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// CRUD access to the records the readiness engine reads and writes.
///
/// Carried in `AppState` as `Arc<dyn SkillRecordStore>`.
#[async_trait]
pub trait SkillRecordStore: Send + Sync {
    async fn get_user_skills(&self, user_id: Uuid) -> Result<Vec<UserSkill>, StoreError>;

    /// Inserts or updates the (user, skill) row and stamps `last_assessed`.
    async fn upsert_user_skill(
        &self,
        user_id: Uuid,
        skill_id: Uuid,
        current_level: i32,
        target_level: Option<i32>,
    ) -> Result<UserSkill, StoreError>;

    async fn get_skill(&self, skill_id: Uuid) -> Result<Option<Skill>, StoreError>;

    async fn get_role(&self, role_id: Uuid) -> Result<Option<Role>, StoreError>;

    async fn get_career_goals(&self, user_id: Uuid) -> Result<Vec<CareerGoal>, StoreError>;

    async fn get_active_career_goal(&self, user_id: Uuid)
        -> Result<Option<CareerGoal>, StoreError>;

    /// Creates the goal as the user's active one; earlier goals lose the flag.
    async fn create_career_goal(&self, goal: NewCareerGoal) -> Result<CareerGoal, StoreError>;

    async fn update_career_goal(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        update: CareerGoalUpdate,
    ) -> Result<Option<CareerGoal>, StoreError>;

    async fn get_user_progress(&self, user_id: Uuid) -> Result<Vec<UserProgress>, StoreError>;

    async fn get_progress_entry(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Option<UserProgress>, StoreError>;

    async fn upsert_progress(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        write: ProgressWrite,
    ) -> Result<UserProgress, StoreError>;

    /// Deletes the entry. Returns false if there was nothing to remove.
    async fn remove_progress(&self, user_id: Uuid, resource_id: Uuid) -> Result<bool, StoreError>;

    async fn get_learning_resources(&self) -> Result<Vec<LearningResource>, StoreError>;

    async fn get_active_learning_path(
        &self,
        user_id: Uuid,
    ) -> Result<Option<LearningPath>, StoreError>;

    /// Stores a regenerated path as the active one and deactivates the previous path.
    async fn create_learning_path(&self, path: NewLearningPath)
        -> Result<LearningPath, StoreError>;

    async fn get_recent_activities(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Activity>, StoreError>;

    async fn record_activity(
        &self,
        user_id: Uuid,
        kind: &str,
        description: &str,
    ) -> Result<(), StoreError>;
}

/// Appends to the activity feed. The feed is secondary to the record it
/// describes, so a failed insert is logged and swallowed.
pub async fn note_activity(
    store: &dyn SkillRecordStore,
    user_id: Uuid,
    kind: &str,
    description: &str,
) {
    if let Err(e) = store.record_activity(user_id, kind, description).await {
        warn!("Failed to record {kind} activity for user {user_id}: {e}");
    }
}
