use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Catalog entry. Seeded by admins, never owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub category: String,
}

/// A user's self-assessed level for one skill. Unique per (user_id, skill_id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserSkill {
    pub id: Uuid,
    pub user_id: Uuid,
    pub skill_id: Uuid,
    pub current_level: i32,
    /// `None` until the user sets one; defaults from the active role's `min_level`.
    pub target_level: Option<i32>,
    pub last_assessed: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RequiredSkill {
    pub skill_id: Uuid,
    pub min_level: i32,
}

/// Catalog entry describing a target position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: Uuid,
    pub title: String,
    pub required_skills: Vec<RequiredSkill>,
}

impl Role {
    pub fn requirement_for(&self, skill_id: Uuid) -> Option<&RequiredSkill> {
        self.required_skills.iter().find(|r| r.skill_id == skill_id)
    }
}

/// Role columns without the required-skill rows, which live in their own table.
#[derive(Debug, Clone, FromRow)]
pub struct RoleRow {
    pub id: Uuid,
    pub title: String,
}
