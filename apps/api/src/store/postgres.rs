use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::models::activity::Activity;
use crate::models::career::{CareerGoal, CareerGoalUpdate, NewCareerGoal};
use crate::models::learning::{
    LearningPath, LearningResource, NewLearningPath, PathModule, ProgressWrite, UserProgress,
};
use crate::models::skill::{RequiredSkill, Role, RoleRow, Skill, UserSkill};
use crate::models::validate_level;
use crate::store::{SkillRecordStore, StoreError};

/// Postgres-backed repository. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgSkillStore {
    pool: PgPool,
}

impl PgSkillStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct LearningPathRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    target_role_id: Option<Uuid>,
    modules: Json<Vec<PathModule>>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<LearningPathRow> for LearningPath {
    fn from(row: LearningPathRow) -> Self {
        LearningPath {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            target_role_id: row.target_role_id,
            modules: row.modules.0,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl SkillRecordStore for PgSkillStore {
    async fn get_user_skills(&self, user_id: Uuid) -> Result<Vec<UserSkill>, StoreError> {
        Ok(sqlx::query_as::<_, UserSkill>(
            "SELECT * FROM user_skills WHERE user_id = $1 ORDER BY skill_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn upsert_user_skill(
        &self,
        user_id: Uuid,
        skill_id: Uuid,
        current_level: i32,
        target_level: Option<i32>,
    ) -> Result<UserSkill, StoreError> {
        Ok(sqlx::query_as::<_, UserSkill>(
            r#"
            INSERT INTO user_skills (id, user_id, skill_id, current_level, target_level, last_assessed)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (user_id, skill_id) DO UPDATE
                SET current_level = EXCLUDED.current_level,
                    target_level = COALESCE(EXCLUDED.target_level, user_skills.target_level),
                    last_assessed = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(skill_id)
        .bind(current_level)
        .bind(target_level)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_skill(&self, skill_id: Uuid) -> Result<Option<Skill>, StoreError> {
        Ok(sqlx::query_as::<_, Skill>("SELECT id, name, category FROM skills WHERE id = $1")
            .bind(skill_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn get_role(&self, role_id: Uuid) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query_as::<_, RoleRow>("SELECT id, title FROM roles WHERE id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let required_skills = sqlx::query_as::<_, RequiredSkill>(
            r#"
            SELECT skill_id, min_level
            FROM role_required_skills
            WHERE role_id = $1
            ORDER BY position, skill_id
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        if let Some(bad) = required_skills
            .iter()
            .find(|r| validate_level("min_level", r.min_level).is_err())
        {
            return Err(StoreError::Corrupt(format!(
                "role {role_id} requires skill {} at level {}",
                bad.skill_id, bad.min_level
            )));
        }

        Ok(Some(Role {
            id: row.id,
            title: row.title,
            required_skills,
        }))
    }

    async fn get_career_goals(&self, user_id: Uuid) -> Result<Vec<CareerGoal>, StoreError> {
        Ok(sqlx::query_as::<_, CareerGoal>(
            "SELECT * FROM career_goals WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_active_career_goal(
        &self,
        user_id: Uuid,
    ) -> Result<Option<CareerGoal>, StoreError> {
        Ok(sqlx::query_as::<_, CareerGoal>(
            r#"
            SELECT * FROM career_goals
            WHERE user_id = $1
            ORDER BY is_active DESC, created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_career_goal(&self, goal: NewCareerGoal) -> Result<CareerGoal, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE career_goals SET is_active = FALSE WHERE user_id = $1")
            .bind(goal.user_id)
            .execute(&mut *tx)
            .await?;

        let created = sqlx::query_as::<_, CareerGoal>(
            r#"
            INSERT INTO career_goals
                (id, user_id, target_role_id, timeline_months, title, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, TRUE, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(goal.user_id)
        .bind(goal.target_role_id)
        .bind(goal.timeline_months)
        .bind(&goal.title)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!(
            "Created career goal {} (role {}) for user {}",
            created.id, created.target_role_id, created.user_id
        );
        Ok(created)
    }

    async fn update_career_goal(
        &self,
        user_id: Uuid,
        goal_id: Uuid,
        update: CareerGoalUpdate,
    ) -> Result<Option<CareerGoal>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM career_goals WHERE id = $1 AND user_id = $2")
                .bind(goal_id)
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Ok(None);
        }

        if update.activate {
            sqlx::query("UPDATE career_goals SET is_active = FALSE WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        let updated = sqlx::query_as::<_, CareerGoal>(
            r#"
            UPDATE career_goals
            SET target_role_id = COALESCE($3, target_role_id),
                timeline_months = COALESCE($4, timeline_months),
                title = COALESCE($5, title),
                is_active = is_active OR $6
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(goal_id)
        .bind(user_id)
        .bind(update.target_role_id)
        .bind(update.timeline_months)
        .bind(update.title)
        .bind(update.activate)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(updated))
    }

    async fn get_user_progress(&self, user_id: Uuid) -> Result<Vec<UserProgress>, StoreError> {
        Ok(sqlx::query_as::<_, UserProgress>(
            "SELECT * FROM user_progress WHERE user_id = $1 ORDER BY started_at, id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_progress_entry(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
    ) -> Result<Option<UserProgress>, StoreError> {
        Ok(sqlx::query_as::<_, UserProgress>(
            "SELECT * FROM user_progress WHERE user_id = $1 AND resource_id = $2",
        )
        .bind(user_id)
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_progress(
        &self,
        user_id: Uuid,
        resource_id: Uuid,
        write: ProgressWrite,
    ) -> Result<UserProgress, StoreError> {
        Ok(sqlx::query_as::<_, UserProgress>(
            r#"
            INSERT INTO user_progress
                (id, user_id, resource_id, progress, completed, score, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), $7)
            ON CONFLICT (user_id, resource_id) DO UPDATE
                SET progress = EXCLUDED.progress,
                    completed = EXCLUDED.completed,
                    score = EXCLUDED.score,
                    completed_at = EXCLUDED.completed_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(resource_id)
        .bind(write.progress)
        .bind(write.completed)
        .bind(write.score)
        .bind(write.completed_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn remove_progress(&self, user_id: Uuid, resource_id: Uuid) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM user_progress WHERE user_id = $1 AND resource_id = $2")
                .bind(user_id)
                .bind(resource_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_learning_resources(&self) -> Result<Vec<LearningResource>, StoreError> {
        Ok(sqlx::query_as::<_, LearningResource>(
            "SELECT id, title, resource_type, duration_minutes, skill_id FROM learning_resources ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_active_learning_path(
        &self,
        user_id: Uuid,
    ) -> Result<Option<LearningPath>, StoreError> {
        let row = sqlx::query_as::<_, LearningPathRow>(
            r#"
            SELECT * FROM learning_paths
            WHERE user_id = $1 AND is_active
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(LearningPath::from))
    }

    async fn create_learning_path(
        &self,
        path: NewLearningPath,
    ) -> Result<LearningPath, StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE learning_paths SET is_active = FALSE WHERE user_id = $1")
            .bind(path.user_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, LearningPathRow>(
            r#"
            INSERT INTO learning_paths (id, user_id, title, target_role_id, modules, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, TRUE, NOW())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(path.user_id)
        .bind(&path.title)
        .bind(path.target_role_id)
        .bind(Json(&path.modules))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        info!("Stored learning path {} for user {}", row.id, row.user_id);
        Ok(row.into())
    }

    async fn get_recent_activities(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Activity>, StoreError> {
        Ok(sqlx::query_as::<_, Activity>(
            "SELECT * FROM activities WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn record_activity(
        &self,
        user_id: Uuid,
        kind: &str,
        description: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO activities (id, user_id, kind, description, created_at) VALUES ($1, $2, $3, $4, NOW())",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(kind)
        .bind(description)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
