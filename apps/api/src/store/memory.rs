//! In-memory repository for tests. Mirrors the Postgres semantics closely
//! enough for the engine: per-row upserts, active-flag bookkeeping, and
//! not-found as `Ok(None)`. Failure injection and slow role lookups let tests
//! drive the degraded and concurrent paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::activity::Activity;
use crate::models::career::{select_active_goal, CareerGoal, CareerGoalUpdate, NewCareerGoal};
use crate::models::learning::{
    LearningPath, LearningResource, NewLearningPath, ProgressWrite, UserProgress,
};
use crate::models::skill::{Role, Skill, UserSkill};
use crate::store::{SkillRecordStore, StoreError};

#[derive(Default)]
struct Tables {
    skills: HashMap<Uuid, Skill>,
    user_skills: Vec<UserSkill>,
    roles: HashMap<Uuid, Role>,
    goals: Vec<CareerGoal>,
    progress: Vec<UserProgress>,
    resources: Vec<LearningResource>,
    paths: Vec<LearningPath>,
    activities: Vec<Activity>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    /// Monotonic clock so inserts made in the same instant still order.
    ticks: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_activities: AtomicBool,
    pub role_fetches: AtomicUsize,
    pub role_delay: Mutex<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) as i64;
        Utc.timestamp_opt(1_700_000_000 + tick, 0).unwrap()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected failure".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_reads.store(failing, Ordering::SeqCst);
    }

    pub fn set_activity_failing(&self, failing: bool) {
        self.fail_activities.store(failing, Ordering::SeqCst);
    }

    pub async fn set_role_delay(&self, delay: Duration) {
        *self.role_delay.lock().await = delay;
    }

    pub fn role_fetch_count(&self) -> usize {
        self.role_fetches.load(Ordering::SeqCst)
    }

    pub async fn add_skill(&self, name: &str, category: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().await.skills.insert(
            id,
            Skill {
                id,
                name: name.to_string(),
                category: category.to_string(),
            },
        );
        id
    }

    pub async fn add_role(&self, role: Role) {
        self.tables.lock().await.roles.insert(role.id, role);
    }

    pub async fn delete_role(&self, role_id: Uuid) {
        self.tables.lock().await.roles.remove(&role_id);
    }

    pub async fn add_resource(&self, resource: LearningResource) {
        self.tables.lock().await.resources.push(resource);
    }

    pub async fn learning_paths(&self, user_id: Uuid) -> Vec<LearningPath> {
        self.tables
            .lock()
            .await
            .paths
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl SkillRecordStore for MemoryStore {
    async fn get_user_skills(&self, user_id: Uuid) -> Result<Vec<UserSkill>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().await;
        let mut skills: Vec<UserSkill> = tables
            .user_skills
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        skills.sort_by_key(|s| s.skill_id);
        Ok(skills)
    }

    async fn upsert_user_skill(
        &self,
        user_id: Uuid,
        skill_id: Uuid,
        current_level: i32,
        target_level: Option<i32>,
    ) -> Result<UserSkill, StoreError> {
        self.check()?;
        let now = self.now();
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables
            .user_skills
            .iter_mut()
            .find(|s| s.user_id == user_id && s.skill_id == skill_id)
        {
            existing.current_level = current_level;
            existing.target_level = target_level.or(existing.target_level);
            existing.last_assessed = now;
            return Ok(existing.clone());
        }
        let created = UserSkill {
            id: Uuid::new_v4(),
            user_id,
            skill_id,
            current_level,
            target_level,
            last_assessed: now,
        };
        tables.user_skills.push(created.clone());
        Ok(created)
    }

    async fn get_skill(&self, skill_id: Uuid) -> Result<Option<Skill>, StoreError> {
        self.check()?;
        Ok(self.tables.lock().await.skills.get(&skill_id).cloned())
    }

    async fn get_role(&self, role_id: Uuid) -> Result<Option<Role>, StoreError> {
        self.check()?;
        self.role_fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.role_delay.lock().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(self.tables.lock().await.roles.get(&role_id).cloned())
    }

    async fn get_career_goals(&self, user_id: Uuid) -> Result<Vec<CareerGoal>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .goals
            .iter()
            .filter(|g| g.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_active_career_goal(
        &self,
        user_id: Uuid,
    ) -> Result<Option<CareerGoal>, StoreError> {
        let goals = self.get_career_goals(user_id).await?;
        Ok(select_active_goal(&goals).cloned())
    }

    async fn create_career_goal(&self, goal: NewCareerGoal) -> Result<CareerGoal, StoreError> {
        self.check()?;
        let now = self.now();
        let mut tables = self.tables.lock().await;
        for existing in tables.goals.iter_mut().filter(|g| g.user_id == goal.user_id) {
            existing.is_active = false;
        }
        let created = CareerGoal {
            id: Uuid::new_v4(),
            user_id: goal.user_id,
            target_role_id: goal.target_role_id,
            timeline_months: goal.timeline_months,
            title: goal.title,
            is_active: true,
            created_at: now,
        };
        tables.goals.push(created.clone());
        Ok(created)
    }

    async fn update_career_goal(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        update: CareerGoalUpdate,
    ) -> Result<Option<CareerGoal>, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        if !tables
            .goals
            .iter()
            .any(|g| g.id == goal_id && g.user_id == user_id)
        {
            return Ok(None);
        }
        if update.activate {
            for g in tables.goals.iter_mut().filter(|g| g.user_id == user_id) {
                g.is_active = false;
            }
        }
        let goal = tables
            .goals
            .iter_mut()
            .find(|g| g.id == goal_id)
            .ok_or_else(|| StoreError::Corrupt(format!("goal {goal_id} vanished")))?;
        if let Some(role_id) = update.target_role_id {
            goal.target_role_id = role_id;
        }
        if let Some(months) = update.timeline_months {
            goal.timeline_months = months;
        }
        if update.title.is_some() {
            goal.title = update.title;
        }
        goal.is_active = goal.is_active || update.activate;
        Ok(Some(goal.clone()))
    }

    async fn get_user_progress(&self, user_id: Uuid) -> Result<Vec<UserProgress>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .progress
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_progress_entry(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Option<UserProgress>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .progress
            .iter()
            .find(|p| p.user_id == user_id && p.resource_id == resource_id)
            .cloned())
    }

    async fn upsert_progress(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        write: ProgressWrite,
    ) -> Result<UserProgress, StoreError> {
        self.check()?;
        let now = self.now();
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables
            .progress
            .iter_mut()
            .find(|p| p.user_id == user_id && p.resource_id == resource_id)
        {
            existing.progress = write.progress;
            existing.completed = write.completed;
            existing.score = write.score;
            existing.completed_at = write.completed_at;
            return Ok(existing.clone());
        }
        let created = UserProgress {
            id: Uuid::new_v4(),
            user_id,
            resource_id,
            progress: write.progress,
            completed: write.completed,
            score: write.score,
            started_at: now,
            completed_at: write.completed_at,
        };
        tables.progress.push(created.clone());
        Ok(created)
    }

    async fn remove_progress(&self, user_id: Uuid, resource_id: Uuid) -> Result<bool, StoreError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        let before = tables.progress.len();
        tables
            .progress
            .retain(|p| !(p.user_id == user_id && p.resource_id == resource_id));
        Ok(tables.progress.len() < before)
    }

    async fn get_learning_resources(&self) -> Result<Vec<LearningResource>, StoreError> {
        self.check()?;
        let mut resources = self.tables.lock().await.resources.clone();
        resources.sort_by_key(|r| r.id);
        Ok(resources)
    }

    async fn get_active_learning_path(
        &self,
        user_id: Uuid,
    ) -> Result<Option<LearningPath>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().await;
        Ok(tables
            .paths
            .iter()
            .filter(|p| p.user_id == user_id && p.is_active)
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn create_learning_path(
        &self,
        path: NewLearningPath,
    ) -> Result<LearningPath, StoreError> {
        self.check()?;
        let now = self.now();
        let mut tables = self.tables.lock().await;
        for existing in tables.paths.iter_mut().filter(|p| p.user_id == path.user_id) {
            existing.is_active = false;
        }
        let created = LearningPath {
            id: Uuid::new_v4(),
            user_id: path.user_id,
            title: path.title,
            target_role_id: path.target_role_id,
            modules: path.modules,
            is_active: true,
            created_at: now,
        };
        tables.paths.push(created.clone());
        Ok(created)
    }

    async fn get_recent_activities(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Activity>, StoreError> {
        self.check()?;
        let tables = self.tables.lock().await;
        let mut activities: Vec<Activity> = tables
            .activities
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        activities.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        activities.truncate(limit.max(0) as usize);
        Ok(activities)
    }

    async fn record_activity(
        &self,
        user_id: Uuid,
        kind: &str,
        description: &str,
    ) -> Result<(), StoreError> {
        self.check()?;
        if self.fail_activities.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("activity log offline".to_string()));
        }
        let now = self.now();
        self.tables.lock().await.activities.push(Activity {
            id: Uuid::new_v4(),
            user_id,
            kind: kind.to_string(),
            description: description.to_string(),
            created_at: now,
        });
        Ok(())
    }
}
