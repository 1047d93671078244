//! Readiness calculator: turns a user's skill levels and a target role into
//! per-skill gap percentages and one overall readiness score.
//!
//! No I/O and no clock: identical inputs give identical output.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::skill::{Role, UserSkill};

/// One row of the skill-gap read model. Percentages are whole numbers 0–100
/// measuring how much of the target level has been reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillGap {
    pub skill_id: Uuid,
    pub current_level: i32,
    pub target_level: i32,
    pub percentage: u8,
    /// The user tracks the skill but the target role does not require it.
    pub out_of_scope: bool,
}

impl SkillGap {
    /// Percentage points still missing; higher means a larger gap.
    pub fn shortfall(&self) -> u8 {
        100 - self.percentage
    }
}

/// Gaps and overall score from a single computation against a single role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapReport {
    pub role_id: Option<Uuid>,
    pub role_title: Option<String>,
    pub gaps: Vec<SkillGap>,
    pub overall_readiness: u8,
}

impl GapReport {
    pub fn empty() -> Self {
        Self {
            role_id: None,
            role_title: None,
            gaps: Vec::new(),
            overall_readiness: 0,
        }
    }

    pub fn in_scope(&self) -> impl Iterator<Item = &SkillGap> {
        self.gaps.iter().filter(|g| !g.out_of_scope)
    }
}

/// Share of `target` reached by `current`, rounded and clamped to 0–100.
/// A zero target has no meaningful ratio and reports 0.
pub fn percent_of_target(current: i32, target: i32) -> u8 {
    if target <= 0 {
        return 0;
    }
    let pct = (current.max(0) as f64 / target as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Share of a role requirement reached. Measured against `max(min_level, 1)`;
/// a requirement that is already met counts as fully reached.
pub fn percent_of_requirement(current: i32, min_level: i32) -> u8 {
    if current >= min_level {
        return 100;
    }
    let pct = (current.max(0) as f64 / min_level.max(1) as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

/// Computes the per-skill gap list for `role`.
///
/// Required skills come first in the role's order; a required skill the user
/// never recorded counts as level 0. Skills the user tracks outside the role
/// follow, sorted by skill id and flagged `out_of_scope`. No role yields an
/// empty list.
pub fn compute_gaps(user_skills: &[UserSkill], role: Option<&Role>) -> Vec<SkillGap> {
    let Some(role) = role else {
        return Vec::new();
    };

    // First row wins if the store ever returns duplicates for one skill.
    let mut by_skill: HashMap<Uuid, &UserSkill> = HashMap::new();
    for skill in user_skills {
        by_skill.entry(skill.skill_id).or_insert(skill);
    }

    let mut seen = HashSet::new();
    let mut gaps = Vec::with_capacity(role.required_skills.len() + user_skills.len());

    for required in &role.required_skills {
        if !seen.insert(required.skill_id) {
            continue;
        }
        let current_level = by_skill
            .get(&required.skill_id)
            .map(|s| s.current_level)
            .unwrap_or(0);
        gaps.push(SkillGap {
            skill_id: required.skill_id,
            current_level,
            target_level: required.min_level,
            percentage: percent_of_requirement(current_level, required.min_level),
            out_of_scope: false,
        });
    }

    let mut extras: Vec<&UserSkill> = by_skill
        .values()
        .copied()
        .filter(|s| !seen.contains(&s.skill_id))
        .collect();
    extras.sort_by_key(|s| s.skill_id);

    for skill in extras {
        let target_level = skill.target_level.unwrap_or(0);
        gaps.push(SkillGap {
            skill_id: skill.skill_id,
            current_level: skill.current_level,
            target_level,
            percentage: percent_of_target(skill.current_level, target_level),
            out_of_scope: true,
        });
    }

    gaps
}

/// Mean of the in-scope percentages, rounded. Out-of-scope rows never count;
/// an empty or fully out-of-scope list scores 0.
pub fn compute_overall_readiness(gaps: &[SkillGap]) -> u8 {
    let (sum, count) = gaps
        .iter()
        .filter(|g| !g.out_of_scope)
        .fold((0u32, 0u32), |(sum, count), g| {
            (sum + g.percentage as u32, count + 1)
        });
    if count == 0 {
        return 0;
    }
    (sum as f64 / count as f64).round().clamp(0.0, 100.0) as u8
}

/// Runs both computations against one role so the pair can never disagree.
pub fn compute_report(user_skills: &[UserSkill], role: Option<&Role>) -> GapReport {
    let gaps = compute_gaps(user_skills, role);
    let overall_readiness = compute_overall_readiness(&gaps);
    GapReport {
        role_id: role.map(|r| r.id),
        role_title: role.map(|r| r.title.clone()),
        gaps,
        overall_readiness,
    }
}

/// Target level a new skill row should default to: the role's requirement for
/// that skill, if the role has one.
pub fn default_target_level(role: Option<&Role>, skill_id: Uuid) -> Option<i32> {
    role.and_then(|r| r.requirement_for(skill_id))
        .map(|req| req.min_level)
}
