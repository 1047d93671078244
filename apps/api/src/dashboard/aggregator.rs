//! Dashboard aggregator: composes the gap report with progress, goal and
//! activity records into the single dashboard read model.
//!
//! Every field is computed as an `Outcome`; a missing role or resource
//! degrades that field to its default and is listed in `degraded`, it never
//! aborts the build.

use std::collections::HashMap;

use serde::{Serialize, Serializer};
use tracing::warn;
use uuid::Uuid;

use crate::dashboard::outcome::{DegradeReason, Outcome};
use crate::models::activity::Activity;
use crate::models::career::{select_active_goal, CareerGoal};
use crate::models::learning::{LearningPath, LearningResource, ProgressStatus, UserProgress};
use crate::models::skill::UserSkill;
use crate::readiness::{GapReport, SkillGap};

pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Readiness as shown to the user: a 0–100 score, or "unknown" when the
/// active goal's role cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessScore {
    Known(u8),
    Unknown,
}

impl Serialize for ReadinessScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Known(score) => serializer.serialize_u8(*score),
            Self::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CareerGoalSummary {
    pub goal_id: Uuid,
    pub target_role_id: Uuid,
    pub target_role_title: Option<String>,
    pub title: Option<String>,
    pub timeline_months: i32,
    pub readiness: ReadinessScore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub skills_tracked: usize,
    pub skills_at_target: usize,
    pub resources_in_progress: usize,
    pub resources_completed: usize,
    /// Resource count of the active learning path; 0 without one.
    pub resources_total: usize,
    /// "completed / total", e.g. "0 / 0".
    pub resources_label: String,
    pub average_score: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardView {
    pub user_id: Uuid,
    pub overall_readiness: ReadinessScore,
    pub skill_gaps: Vec<SkillGap>,
    pub career_goal_summary: Option<CareerGoalSummary>,
    /// Minutes of learning, weighted by progress through each resource.
    pub learning_time_total: u32,
    pub stats: DashboardStats,
    pub recent_activities: Vec<Activity>,
    pub degraded: Vec<DegradeReason>,
}

/// Everything the aggregator reads, loaded once by the caller.
pub struct DashboardInputs<'a> {
    pub user_id: Uuid,
    pub user_skills: &'a [UserSkill],
    pub progress: &'a [UserProgress],
    pub goals: &'a [CareerGoal],
    pub activities: &'a [Activity],
    pub resources: &'a [LearningResource],
    pub active_path: Option<&'a LearningPath>,
    pub gap_result: Outcome<GapReport>,
}

pub fn build_dashboard(inputs: DashboardInputs<'_>) -> DashboardView {
    let mut degraded = Vec::new();

    let role_resolved = !has_role_gap(&inputs.gap_result);
    let report = inputs.gap_result.collect_into(&mut degraded);

    let goal_summary = summarize_goal(inputs.goals, &report, role_resolved);
    let overall_readiness = match &goal_summary {
        Some(summary) => summary.readiness,
        None => ReadinessScore::Known(report.overall_readiness),
    };

    let durations = duration_index(inputs.resources);
    let learning_time_total =
        learning_time_total(inputs.user_id, inputs.progress, &durations).collect_into(&mut degraded);

    let stats = compute_stats(inputs.user_skills, inputs.progress, inputs.active_path, &report);

    let mut recent_activities = inputs.activities.to_vec();
    recent_activities.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    recent_activities.truncate(RECENT_ACTIVITY_LIMIT);

    DashboardView {
        user_id: inputs.user_id,
        overall_readiness,
        skill_gaps: report.gaps,
        career_goal_summary: goal_summary,
        learning_time_total,
        stats,
        recent_activities,
        degraded,
    }
}

fn has_role_gap(gap_result: &Outcome<GapReport>) -> bool {
    match gap_result {
        Outcome::Ok(_) => false,
        Outcome::Degraded { reasons, .. } => reasons
            .iter()
            .any(|r| matches!(r, DegradeReason::RoleNotFound { .. })),
    }
}

fn summarize_goal(
    goals: &[CareerGoal],
    report: &GapReport,
    role_resolved: bool,
) -> Option<CareerGoalSummary> {
    let goal = select_active_goal(goals)?;
    let matches_report = role_resolved && report.role_id == Some(goal.target_role_id);
    let readiness = if matches_report {
        ReadinessScore::Known(report.overall_readiness)
    } else {
        ReadinessScore::Unknown
    };
    Some(CareerGoalSummary {
        goal_id: goal.id,
        target_role_id: goal.target_role_id,
        target_role_title: report.role_title.clone().filter(|_| matches_report),
        title: goal.title.clone(),
        timeline_months: goal.timeline_months,
        readiness,
    })
}

/// Resource durations keyed by id, built once per dashboard build.
fn duration_index(resources: &[LearningResource]) -> HashMap<Uuid, i32> {
    resources
        .iter()
        .map(|r| (r.id, r.duration_minutes.max(0)))
        .collect()
}

fn learning_time_total(
    user_id: Uuid,
    progress: &[UserProgress],
    durations: &HashMap<Uuid, i32>,
) -> Outcome<u32> {
    let mut minutes = 0.0_f64;
    let mut reasons = Vec::new();

    for entry in progress {
        match durations.get(&entry.resource_id) {
            Some(duration) => {
                minutes += entry.progress.clamp(0, 100) as f64 / 100.0 * *duration as f64;
            }
            None => {
                warn!(
                    "Progress entry {} for user {} references missing resource {}; counting 0 minutes",
                    entry.id, user_id, entry.resource_id
                );
                reasons.push(DegradeReason::ResourceNotFound {
                    resource_id: entry.resource_id,
                });
            }
        }
    }

    let total = minutes.round() as u32;
    if reasons.is_empty() {
        Outcome::Ok(total)
    } else {
        Outcome::Degraded {
            value: total,
            reasons,
        }
    }
}

fn compute_stats(
    user_skills: &[UserSkill],
    progress: &[UserProgress],
    active_path: Option<&LearningPath>,
    report: &GapReport,
) -> DashboardStats {
    let count = |status: ProgressStatus| progress.iter().filter(|p| p.status() == status).count();
    let resources_completed = count(ProgressStatus::Completed);
    let resources_in_progress = count(ProgressStatus::InProgress);
    let resources_total = active_path.map(|p| p.total_resources()).unwrap_or(0);

    let scores: Vec<i32> = progress.iter().filter_map(|p| p.score).collect();
    let average_score = if scores.is_empty() {
        None
    } else {
        let mean = scores.iter().map(|s| *s as f64).sum::<f64>() / scores.len() as f64;
        Some(mean.round().clamp(0.0, 100.0) as u8)
    };

    DashboardStats {
        skills_tracked: user_skills.len(),
        skills_at_target: report.in_scope().filter(|g| g.percentage == 100).count(),
        resources_in_progress,
        resources_completed,
        resources_total,
        resources_label: format!("{resources_completed} / {resources_total}"),
        average_score,
    }
}
