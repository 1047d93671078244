//! Validated write entry points.
//!
//! Each mutation rejects bad input before touching storage, writes through
//! the repository, dispatches its trigger as soon as the write lands, then
//! notes an activity. A rejected mutation never invalidates anything.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::activity::{
    ACTIVITY_GOAL_SET, ACTIVITY_GOAL_UPDATED, ACTIVITY_PROGRESS, ACTIVITY_PROGRESS_REMOVED,
    ACTIVITY_SKILL_UPDATED,
};
use crate::models::career::{CareerGoal, CareerGoalUpdate, NewCareerGoal};
use crate::models::learning::{plan_progress_write, UserProgress};
use crate::models::skill::{Role, UserSkill};
use crate::models::validate_level;
use crate::propagation::propagator::{LearningPathView, Propagator, Snapshot};
use crate::propagation::table::Trigger;
use crate::readiness::calculator::default_target_level;
use crate::store::{note_activity, SkillRecordStore};

pub const MAX_TIMELINE_MONTHS: i32 = 120;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillLevelInput {
    pub current_level: i32,
    pub target_level: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerGoalInput {
    pub target_role_id: Uuid,
    pub timeline_months: i32,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressInput {
    pub progress: i32,
    pub score: Option<i32>,
}

fn validate_timeline(months: i32) -> Result<(), AppError> {
    if (1..=MAX_TIMELINE_MONTHS).contains(&months) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "timelineMonths must be between 1 and {MAX_TIMELINE_MONTHS}, got {months}"
        )))
    }
}

async fn require_role(store: &dyn SkillRecordStore, role_id: Uuid) -> Result<Role, AppError> {
    store
        .get_role(role_id)
        .await?
        .ok_or_else(|| AppError::Validation(format!("targetRoleId {role_id} does not exist")))
}

/// Records a skill assessment. A first assessment without an explicit target
/// takes the active role's requirement as its target.
pub async fn update_skill_level(
    store: &dyn SkillRecordStore,
    propagator: &Arc<Propagator>,
    user_id: Uuid,
    skill_id: Uuid,
    input: SkillLevelInput,
) -> Result<UserSkill, AppError> {
    validate_level("currentLevel", input.current_level).map_err(AppError::Validation)?;
    if let Some(target) = input.target_level {
        validate_level("targetLevel", target).map_err(AppError::Validation)?;
    }

    let skill = store
        .get_skill(skill_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Skill {skill_id} not found")))?;

    let tracked = store
        .get_user_skills(user_id)
        .await?
        .iter()
        .any(|s| s.skill_id == skill_id);
    let target_level = match input.target_level {
        Some(target) => Some(target),
        None if tracked => None,
        None => {
            let role = match store.get_active_career_goal(user_id).await? {
                Some(goal) => store.get_role(goal.target_role_id).await?,
                None => None,
            };
            default_target_level(role.as_ref(), skill_id)
        }
    };

    let saved = store
        .upsert_user_skill(user_id, skill_id, input.current_level, target_level)
        .await?;
    propagator.dispatch(user_id, Trigger::SkillLevelChanged);

    note_activity(
        store,
        user_id,
        ACTIVITY_SKILL_UPDATED,
        &format!("Assessed {} at level {}", skill.name, saved.current_level),
    )
    .await;
    Ok(saved)
}

/// Creates a new active goal for `target_role_id`; earlier goals stay as history.
pub async fn set_target_role(
    store: &dyn SkillRecordStore,
    propagator: &Arc<Propagator>,
    user_id: Uuid,
    input: CareerGoalInput,
) -> Result<CareerGoal, AppError> {
    validate_timeline(input.timeline_months)?;
    let role = require_role(store, input.target_role_id).await?;

    let previous_role_id = store
        .get_active_career_goal(user_id)
        .await?
        .map(|g| g.target_role_id);

    let goal = store
        .create_career_goal(NewCareerGoal {
            user_id,
            target_role_id: role.id,
            timeline_months: input.timeline_months,
            title: input.title,
        })
        .await?;

    let trigger = if previous_role_id == Some(role.id) {
        Trigger::CareerGoalChanged {
            previous_role_id,
            new_role_id: Some(role.id),
        }
    } else {
        Trigger::TargetRoleChanged
    };
    info!("User {} now targets role {}", user_id, role.id);
    propagator.dispatch(user_id, trigger);

    note_activity(
        store,
        user_id,
        ACTIVITY_GOAL_SET,
        &format!("Set goal: {} in {} months", role.title, goal.timeline_months),
    )
    .await;
    Ok(goal)
}

pub async fn update_career_goal(
    store: &dyn SkillRecordStore,
    propagator: &Arc<Propagator>,
    user_id: Uuid,
    goal_id: Uuid,
    update: CareerGoalUpdate,
) -> Result<CareerGoal, AppError> {
    if let Some(months) = update.timeline_months {
        validate_timeline(months)?;
    }
    if let Some(role_id) = update.target_role_id {
        require_role(store, role_id).await?;
    }

    let previous_role_id = store
        .get_active_career_goal(user_id)
        .await?
        .map(|g| g.target_role_id);

    let goal = store
        .update_career_goal(user_id, goal_id, update)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Career goal {goal_id} not found")))?;

    // The write has landed; without the new active role, invalidate as a role change.
    let new_role_id = match store.get_active_career_goal(user_id).await {
        Ok(active) => active.map(|g| g.target_role_id),
        Err(e) => {
            propagator.dispatch(user_id, Trigger::TargetRoleChanged);
            return Err(e.into());
        }
    };
    propagator.dispatch(
        user_id,
        Trigger::CareerGoalChanged {
            previous_role_id,
            new_role_id,
        },
    );

    note_activity(
        store,
        user_id,
        ACTIVITY_GOAL_UPDATED,
        &format!("Updated career goal {}", goal.id),
    )
    .await;
    Ok(goal)
}

pub async fn record_progress(
    store: &dyn SkillRecordStore,
    propagator: &Arc<Propagator>,
    user_id: Uuid,
    resource_id: Uuid,
    input: ProgressInput,
) -> Result<UserProgress, AppError> {
    validate_level("progress", input.progress).map_err(AppError::Validation)?;
    if let Some(score) = input.score {
        validate_level("score", score).map_err(AppError::Validation)?;
    }

    let resource = store
        .get_learning_resources()
        .await?
        .into_iter()
        .find(|r| r.id == resource_id)
        .ok_or_else(|| AppError::NotFound(format!("Learning resource {resource_id} not found")))?;

    let existing = store.get_progress_entry(user_id, resource_id).await?;
    let write = plan_progress_write(existing.as_ref(), input.progress, input.score, Utc::now())
        .map_err(AppError::Validation)?;
    let was_completed = existing.map(|p| p.completed).unwrap_or(false);

    let saved = store.upsert_progress(user_id, resource_id, write).await?;
    propagator.dispatch(user_id, Trigger::ProgressChanged);

    let description = if saved.completed && !was_completed {
        format!("Completed {}", resource.title)
    } else {
        format!("{}% through {}", saved.progress, resource.title)
    };
    note_activity(store, user_id, ACTIVITY_PROGRESS, &description).await;
    Ok(saved)
}

/// Deletes a progress entry, the only way to move progress backwards.
pub async fn remove_progress(
    store: &dyn SkillRecordStore,
    propagator: &Arc<Propagator>,
    user_id: Uuid,
    resource_id: Uuid,
) -> Result<(), AppError> {
    if !store.remove_progress(user_id, resource_id).await? {
        return Err(AppError::NotFound(format!(
            "No progress recorded for resource {resource_id}"
        )));
    }
    propagator.dispatch(user_id, Trigger::ProgressChanged);

    note_activity(
        store,
        user_id,
        ACTIVITY_PROGRESS_REMOVED,
        &format!("Reset progress on resource {resource_id}"),
    )
    .await;
    Ok(())
}

/// Requests a new learning path and waits for it.
pub async fn regenerate_learning_path(
    propagator: &Arc<Propagator>,
    user_id: Uuid,
) -> Result<Snapshot<LearningPathView>, AppError> {
    propagator.dispatch(user_id, Trigger::LearningPathRequested);
    Ok(propagator.learning_path(user_id).await?)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::advisor::LearningPathAdvisor;
    use crate::models::learning::{LearningResource, ProgressStatus, RESOURCE_COURSE};
    use crate::models::skill::RequiredSkill;
    use crate::propagation::table::{ModelKey, ModelState};
    use crate::store::memory::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        propagator: Arc<Propagator>,
        user_id: Uuid,
        sql: Uuid,
        role_id: Uuid,
        resource_id: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let sql = store.add_skill("SQL", "data").await;
        let role_id = Uuid::new_v4();
        store
            .add_role(Role {
                id: role_id,
                title: "Data Analyst".to_string(),
                required_skills: vec![RequiredSkill {
                    skill_id: sql,
                    min_level: 70,
                }],
            })
            .await;
        let resource_id = Uuid::new_v4();
        store
            .add_resource(LearningResource {
                id: resource_id,
                title: "SQL Basics".to_string(),
                resource_type: RESOURCE_COURSE.to_string(),
                duration_minutes: 60,
                skill_id: Some(sql),
            })
            .await;

        let advisor = LearningPathAdvisor::new(None, Duration::from_secs(10));
        let propagator = Arc::new(Propagator::new(store.clone(), advisor, false));
        Fixture {
            store,
            propagator,
            user_id: Uuid::new_v4(),
            sql,
            role_id,
            resource_id,
        }
    }

    fn goal_input(role_id: Uuid) -> CareerGoalInput {
        CareerGoalInput {
            target_role_id: role_id,
            timeline_months: 6,
            title: Some("Move into analytics".to_string()),
        }
    }

    fn state(f: &Fixture, key: ModelKey) -> ModelState {
        f.propagator
            .model_states(f.user_id)
            .models
            .into_iter()
            .find(|s| s.model == key)
            .map(|s| s.entry.state)
            .unwrap()
    }

    #[tokio::test]
    async fn test_invalid_level_rejected_before_any_trigger() {
        let f = fixture().await;
        f.propagator.dashboard(f.user_id).await.unwrap();

        let err = update_skill_level(
            f.store.as_ref(),
            &f.propagator,
            f.user_id,
            f.sql,
            SkillLevelInput {
                current_level: 140,
                target_level: None,
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(state(&f, ModelKey::Dashboard), ModelState::Fresh);
        assert!(f.store.get_user_skills(f.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_assessment_defaults_target_from_role() {
        let f = fixture().await;
        set_target_role(f.store.as_ref(), &f.propagator, f.user_id, goal_input(f.role_id))
            .await
            .unwrap();

        let saved = update_skill_level(
            f.store.as_ref(),
            &f.propagator,
            f.user_id,
            f.sql,
            SkillLevelInput {
                current_level: 35,
                target_level: None,
            },
        )
        .await
        .unwrap();

        assert_eq!(saved.target_level, Some(70));
        let dashboard = f.propagator.dashboard(f.user_id).await.unwrap();
        assert_eq!(
            dashboard.data.overall_readiness,
            crate::dashboard::aggregator::ReadinessScore::Known(50)
        );
        assert_eq!(dashboard.data.recent_activities.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_skill_is_not_found() {
        let f = fixture().await;
        let err = update_skill_level(
            f.store.as_ref(),
            &f.propagator,
            f.user_id,
            Uuid::new_v4(),
            SkillLevelInput {
                current_level: 10,
                target_level: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_goal_for_missing_role_rejected() {
        let f = fixture().await;
        let err = set_target_role(
            f.store.as_ref(),
            &f.propagator,
            f.user_id,
            goal_input(Uuid::new_v4()),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(f.store.get_career_goals(f.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_goal_update_same_role_touches_dashboard_only() {
        let f = fixture().await;
        let goal = set_target_role(
            f.store.as_ref(),
            &f.propagator,
            f.user_id,
            goal_input(f.role_id),
        )
        .await
        .unwrap();
        f.propagator.learning_path(f.user_id).await.unwrap();
        f.propagator.dashboard(f.user_id).await.unwrap();

        update_career_goal(
            f.store.as_ref(),
            &f.propagator,
            f.user_id,
            goal.id,
            CareerGoalUpdate {
                timeline_months: Some(9),
                ..CareerGoalUpdate::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(state(&f, ModelKey::RoleDetail), ModelState::Fresh);
        assert_eq!(state(&f, ModelKey::SkillGap), ModelState::Fresh);
        assert_eq!(state(&f, ModelKey::LearningPath), ModelState::Fresh);
        assert_eq!(state(&f, ModelKey::Dashboard), ModelState::Stale);

        let dashboard = f.propagator.dashboard(f.user_id).await.unwrap();
        assert_eq!(
            dashboard.data.career_goal_summary.unwrap().timeline_months,
            9
        );
    }

    #[tokio::test]
    async fn test_unknown_goal_is_not_found() {
        let f = fixture().await;
        let err = update_career_goal(
            f.store.as_ref(),
            &f.propagator,
            f.user_id,
            Uuid::new_v4(),
            CareerGoalUpdate::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_progress_moves_forward_and_completes() {
        let f = fixture().await;
        let input = |progress| ProgressInput {
            progress,
            score: None,
        };

        let halfway = record_progress(
            f.store.as_ref(),
            &f.propagator,
            f.user_id,
            f.resource_id,
            input(50),
        )
        .await
        .unwrap();
        assert_eq!(halfway.status(), ProgressStatus::InProgress);

        let err = record_progress(
            f.store.as_ref(),
            &f.propagator,
            f.user_id,
            f.resource_id,
            input(20),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let done = record_progress(
            f.store.as_ref(),
            &f.propagator,
            f.user_id,
            f.resource_id,
            input(100),
        )
        .await
        .unwrap();
        assert_eq!(done.status(), ProgressStatus::Completed);

        let dashboard = f.propagator.dashboard(f.user_id).await.unwrap();
        assert_eq!(dashboard.data.learning_time_total, 60);
        assert_eq!(dashboard.data.stats.resources_completed, 1);
    }

    #[tokio::test]
    async fn test_remove_progress_resets_and_refreshes() {
        let f = fixture().await;
        record_progress(
            f.store.as_ref(),
            &f.propagator,
            f.user_id,
            f.resource_id,
            ProgressInput {
                progress: 40,
                score: Some(90),
            },
        )
        .await
        .unwrap();
        let before = f.propagator.dashboard(f.user_id).await.unwrap();
        assert_eq!(before.data.learning_time_total, 24);

        remove_progress(f.store.as_ref(), &f.propagator, f.user_id, f.resource_id)
            .await
            .unwrap();
        let after = f.propagator.dashboard(f.user_id).await.unwrap();
        assert_eq!(after.data.learning_time_total, 0);

        let err = remove_progress(f.store.as_ref(), &f.propagator, f.user_id, f.resource_id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_regenerate_stores_fallback_path() {
        let f = fixture().await;
        set_target_role(f.store.as_ref(), &f.propagator, f.user_id, goal_input(f.role_id))
            .await
            .unwrap();

        let snapshot = regenerate_learning_path(&f.propagator, f.user_id)
            .await
            .unwrap();

        let path = snapshot.data.path.unwrap();
        assert_eq!(path.modules[0].resources[0].resource_id, f.resource_id);
        assert_eq!(f.store.learning_paths(f.user_id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_activity_insert_still_invalidates() {
        let f = fixture().await;
        set_target_role(f.store.as_ref(), &f.propagator, f.user_id, goal_input(f.role_id))
            .await
            .unwrap();
        f.store.upsert_user_skill(f.user_id, f.sql, 35, None).await.unwrap();
        f.propagator.notify(f.user_id, &Trigger::SkillLevelChanged);
        let before = f.propagator.dashboard(f.user_id).await.unwrap();
        assert_eq!(
            before.data.overall_readiness,
            crate::dashboard::aggregator::ReadinessScore::Known(50)
        );

        f.store.set_activity_failing(true);
        let saved = update_skill_level(
            f.store.as_ref(),
            &f.propagator,
            f.user_id,
            f.sql,
            SkillLevelInput {
                current_level: 70,
                target_level: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(saved.current_level, 70);
        assert_eq!(state(&f, ModelKey::Dashboard), ModelState::Stale);

        let after = f.propagator.dashboard(f.user_id).await.unwrap();
        assert!(!after.stale);
        assert_eq!(
            after.data.overall_readiness,
            crate::dashboard::aggregator::ReadinessScore::Known(100)
        );
    }
}
