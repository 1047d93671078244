// Deterministic learning path and gap analysis, used whenever the generator
// is unavailable, slow or wrong. Same inputs, same output.

use std::collections::HashMap;

use uuid::Uuid;

use crate::advisor::{
    AdvisorGoal, GapAnalysis, LearningPathSuggestion, SuggestedModule, SuggestedResource,
    SuggestionSource,
};
use crate::models::learning::{
    LearningResource, RESOURCE_ASSESSMENT, RESOURCE_COURSE, RESOURCE_WORKSHOP,
};
use crate::readiness::SkillGap;

pub const FOUNDATION_MODULE: &str = "Foundation";
pub const ADVANCED_MODULE: &str = "Advanced";
pub const MODULE_RESOURCE_CAP: usize = 3;
/// Gap skills that get foundation courses; the rest go to Advanced.
pub const FOUNDATION_SKILL_COUNT: usize = 3;
const PRIORITY_SKILL_LIMIT: usize = 5;

/// Open gaps, largest first: in-scope before out-of-scope, then lowest
/// percentage, then skill id. An untargeted out-of-scope skill is no gap.
fn rank_gaps(gaps: &[SkillGap]) -> Vec<&SkillGap> {
    let mut open: Vec<&SkillGap> = gaps
        .iter()
        .filter(|g| g.percentage < 100)
        .filter(|g| !(g.out_of_scope && g.target_level == 0))
        .collect();
    open.sort_by_key(|g| (g.out_of_scope, g.percentage, g.skill_id));
    open
}

pub fn fallback_path(
    goal: &AdvisorGoal,
    gaps: &[SkillGap],
    catalog: &[LearningResource],
    reason: &str,
) -> LearningPathSuggestion {
    let ranked = rank_gaps(gaps);
    let split = ranked.len().min(FOUNDATION_SKILL_COUNT);
    let (foundation, advanced) = ranked.split_at(split);
    let foundation: Vec<Uuid> = foundation.iter().map(|g| g.skill_id).collect();
    let advanced: Vec<Uuid> = advanced.iter().map(|g| g.skill_id).collect();

    let modules = vec![
        SuggestedModule {
            title: FOUNDATION_MODULE.to_string(),
            resources: pick_resources(catalog, &[RESOURCE_COURSE], &foundation, &advanced),
        },
        SuggestedModule {
            title: ADVANCED_MODULE.to_string(),
            resources: pick_resources(
                catalog,
                &[RESOURCE_WORKSHOP, RESOURCE_ASSESSMENT],
                &advanced,
                &foundation,
            ),
        },
    ];

    let title = match &goal.target_role_title {
        Some(role) => format!("Path to {role}"),
        None => "Personal learning path".to_string(),
    };

    LearningPathSuggestion {
        title,
        modules,
        source: SuggestionSource::Fallback,
        fallback_reason: Some(reason.to_string()),
    }
}

/// Up to `MODULE_RESOURCE_CAP` resources of the given types.
///
/// Preference order: linked to a `primary` skill, linked to a `secondary`
/// skill, unlinked. Within a tier, by skill rank, then title, then id.
/// Resources for skills without an open gap are never picked.
fn pick_resources(
    catalog: &[LearningResource],
    types: &[&str],
    primary: &[Uuid],
    secondary: &[Uuid],
) -> Vec<SuggestedResource> {
    let rank: HashMap<Uuid, (u8, usize)> = primary
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, (0, i)))
        .chain(secondary.iter().enumerate().map(|(i, id)| (*id, (1, i))))
        .collect();

    let mut candidates: Vec<((u8, usize), &LearningResource)> = catalog
        .iter()
        .filter(|r| types.contains(&r.resource_type.as_str()))
        .filter_map(|r| match r.skill_id {
            Some(skill) => rank.get(&skill).map(|key| (*key, r)),
            None => Some(((2, 0), r)),
        })
        .collect();

    candidates.sort_by(|(ka, a), (kb, b)| {
        ka.cmp(kb)
            .then_with(|| a.title.cmp(&b.title))
            .then_with(|| a.id.cmp(&b.id))
    });

    candidates
        .into_iter()
        .take(MODULE_RESOURCE_CAP)
        .map(|(_, r)| SuggestedResource {
            resource_id: r.id,
            title: r.title.clone(),
            resource_type: r.resource_type.clone(),
        })
        .collect()
}

pub fn fallback_analysis(goal: &AdvisorGoal, gaps: &[SkillGap]) -> GapAnalysis {
    let in_scope: Vec<&SkillGap> = gaps.iter().filter(|g| !g.out_of_scope).collect();
    let at_target = in_scope.iter().filter(|g| g.percentage >= 100).count();
    let priority: Vec<&SkillGap> = rank_gaps(gaps)
        .into_iter()
        .filter(|g| !g.out_of_scope)
        .take(PRIORITY_SKILL_LIMIT)
        .collect();

    let role = goal
        .target_role_title
        .as_deref()
        .unwrap_or("your target role");
    let summary = if in_scope.is_empty() {
        format!("No required skills are known for {role}.")
    } else {
        format!(
            "{at_target} of {} required skills for {role} are at target.",
            in_scope.len()
        )
    };

    let recommendations = priority
        .iter()
        .map(|g| {
            format!(
                "Raise skill {} from level {} to {} ({} points short of target).",
                g.skill_id,
                g.current_level,
                g.target_level,
                g.shortfall()
            )
        })
        .collect();

    GapAnalysis {
        summary,
        priority_skills: priority.iter().map(|g| g.skill_id).collect(),
        recommendations,
        source: SuggestionSource::Fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gap(skill_id: Uuid, percentage: u8) -> SkillGap {
        SkillGap {
            skill_id,
            current_level: percentage as i32,
            target_level: 100,
            percentage,
            out_of_scope: false,
        }
    }

    fn resource(title: &str, kind: &str, skill_id: Option<Uuid>) -> LearningResource {
        LearningResource {
            id: Uuid::new_v4(),
            title: title.to_string(),
            resource_type: kind.to_string(),
            duration_minutes: 30,
            skill_id,
        }
    }

    fn titles(module: &SuggestedModule) -> Vec<&str> {
        module.resources.iter().map(|r| r.title.as_str()).collect()
    }

    #[test]
    fn test_lowest_percentage_skills_get_foundation_courses() {
        let ids: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
        let gaps = vec![
            gap(ids[0], 90),
            gap(ids[1], 10),
            gap(ids[2], 40),
            gap(ids[3], 20),
        ];
        let catalog = vec![
            resource("Course A", RESOURCE_COURSE, Some(ids[0])),
            resource("Course B", RESOURCE_COURSE, Some(ids[1])),
            resource("Course C", RESOURCE_COURSE, Some(ids[2])),
            resource("Course D", RESOURCE_COURSE, Some(ids[3])),
            resource("Workshop A", RESOURCE_WORKSHOP, Some(ids[0])),
            resource("Exam B", RESOURCE_ASSESSMENT, Some(ids[1])),
        ];

        let path = fallback_path(&AdvisorGoal::default(), &gaps, &catalog, "test");

        assert_eq!(path.modules[0].title, FOUNDATION_MODULE);
        assert_eq!(titles(&path.modules[0]), vec!["Course B", "Course D", "Course C"]);
        assert_eq!(path.modules[1].title, ADVANCED_MODULE);
        // ids[0] is the only advanced skill, then foundation skills top up.
        assert_eq!(titles(&path.modules[1]), vec!["Workshop A", "Exam B"]);
    }

    #[test]
    fn test_met_skills_and_capping() {
        let weak = Uuid::new_v4();
        let met = Uuid::new_v4();
        let gaps = vec![gap(weak, 0), gap(met, 100)];
        let catalog = vec![
            resource("Met course", RESOURCE_COURSE, Some(met)),
            resource("Weak 1", RESOURCE_COURSE, Some(weak)),
            resource("Weak 2", RESOURCE_COURSE, Some(weak)),
            resource("Generic", RESOURCE_COURSE, None),
            resource("Weak 3", RESOURCE_COURSE, Some(weak)),
        ];

        let path = fallback_path(&AdvisorGoal::default(), &gaps, &catalog, "test");

        assert_eq!(titles(&path.modules[0]), vec!["Weak 1", "Weak 2", "Weak 3"]);
        assert!(path.modules[1].resources.is_empty());
    }

    #[test]
    fn test_untargeted_extra_skill_gets_no_resources() {
        let weak = Uuid::new_v4();
        let hobby = Uuid::new_v4();
        let untargeted = SkillGap {
            skill_id: hobby,
            current_level: 30,
            target_level: 0,
            percentage: 0,
            out_of_scope: true,
        };
        let catalog = vec![
            resource("Weak course", RESOURCE_COURSE, Some(weak)),
            resource("Hobby course", RESOURCE_COURSE, Some(hobby)),
            resource("Hobby workshop", RESOURCE_WORKSHOP, Some(hobby)),
        ];

        let path = fallback_path(
            &AdvisorGoal::default(),
            &[gap(weak, 40), untargeted],
            &catalog,
            "test",
        );

        assert_eq!(titles(&path.modules[0]), vec!["Weak course"]);
        assert!(path.modules[1].resources.is_empty());
    }

    #[test]
    fn test_unlinked_resources_top_up() {
        let weak = Uuid::new_v4();
        let catalog = vec![
            resource("Zeta", RESOURCE_COURSE, None),
            resource("Alpha", RESOURCE_COURSE, None),
            resource("Weak", RESOURCE_COURSE, Some(weak)),
        ];
        let path = fallback_path(&AdvisorGoal::default(), &[gap(weak, 30)], &catalog, "test");
        assert_eq!(titles(&path.modules[0]), vec!["Weak", "Alpha", "Zeta"]);
    }

    #[test]
    fn test_title_uses_role() {
        let goal = AdvisorGoal {
            target_role_title: Some("Data Engineer".to_string()),
            ..AdvisorGoal::default()
        };
        let path = fallback_path(&goal, &[], &[], "timeout");
        assert_eq!(path.title, "Path to Data Engineer");
        assert_eq!(path.fallback_reason.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_analysis_prioritizes_largest_gaps() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let mut extra = gap(Uuid::new_v4(), 0);
        extra.out_of_scope = true;
        let gaps = vec![gap(a, 50), gap(b, 100), gap(c, 5), extra];

        let analysis = fallback_analysis(&AdvisorGoal::default(), &gaps);

        assert_eq!(analysis.priority_skills, vec![c, a]);
        assert_eq!(analysis.recommendations.len(), 2);
        assert!(analysis.summary.starts_with("1 of 3"));
    }
}
