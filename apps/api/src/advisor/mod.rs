//! Learning path advisor: the boundary to the external generative service.
//!
//! `LearningPathAdvisor` never fails: a timeout, error or malformed reply
//! from the `PathGenerator` is logged and replaced by the deterministic
//! fallback in `fallback.rs`. With no generator configured it serves the
//! fallback directly.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::llm_client::LlmError;
use crate::models::career::CareerGoal;
use crate::models::learning::LearningResource;
use crate::readiness::SkillGap;

pub mod fallback;
pub mod generator;
pub mod prompts;

pub use generator::LlmPathGenerator;

// ────────────────────────────────────────────────────────────────────────────
// Payloads
// ────────────────────────────────────────────────────────────────────────────

/// Goal fields sent to the generator. Nothing beyond the target and timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorGoal {
    pub target_role_id: Option<Uuid>,
    pub target_role_title: Option<String>,
    pub timeline_months: Option<i32>,
}

impl AdvisorGoal {
    pub fn from_goal(goal: Option<&CareerGoal>, role_title: Option<&str>) -> Self {
        Self {
            target_role_id: goal.map(|g| g.target_role_id),
            target_role_title: role_title.map(str::to_string),
            timeline_months: goal.map(|g| g.timeline_months),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorRequest {
    pub goal: AdvisorGoal,
    pub skills: Vec<SkillGap>,
    pub resources: Vec<LearningResource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionSource {
    Generated,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedResource {
    pub resource_id: Uuid,
    pub title: String,
    pub resource_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedModule {
    pub title: String,
    pub resources: Vec<SuggestedResource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningPathSuggestion {
    pub title: String,
    pub modules: Vec<SuggestedModule>,
    pub source: SuggestionSource,
    /// Why the fallback was used, when it was.
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GapAnalysis {
    pub summary: String,
    pub priority_skills: Vec<Uuid>,
    pub recommendations: Vec<String>,
    pub source: SuggestionSource,
}

// ────────────────────────────────────────────────────────────────────────────
// Generator trait
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("generator call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("generator reply is malformed: {0}")]
    Malformed(String),
}

/// The external generative service. Swap implementations without touching
/// the advisor or its callers.
#[async_trait]
pub trait PathGenerator: Send + Sync {
    async fn generate_learning_path(
        &self,
        request: &AdvisorRequest,
    ) -> Result<LearningPathSuggestion, AdvisorError>;

    async fn analyze_skill_gap(&self, request: &AdvisorRequest)
        -> Result<GapAnalysis, AdvisorError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Advisor
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct LearningPathAdvisor {
    generator: Option<Arc<dyn PathGenerator>>,
    timeout: Duration,
}

impl LearningPathAdvisor {
    pub fn new(generator: Option<Arc<dyn PathGenerator>>, timeout: Duration) -> Self {
        Self { generator, timeout }
    }

    /// Suggests a learning path, bounded by the configured timeout.
    pub async fn suggest_path(
        &self,
        goal: &AdvisorGoal,
        gaps: &[SkillGap],
        catalog: &[LearningResource],
    ) -> LearningPathSuggestion {
        let Some(generator) = &self.generator else {
            return fallback::fallback_path(goal, gaps, catalog, "generator not configured");
        };

        let request = AdvisorRequest {
            goal: goal.clone(),
            skills: gaps.to_vec(),
            resources: catalog.to_vec(),
        };

        let reason = match tokio::time::timeout(
            self.timeout,
            generator.generate_learning_path(&request),
        )
        .await
        {
            Err(_) => format!("generator timed out after {}s", self.timeout.as_secs()),
            Ok(Err(e)) => e.to_string(),
            Ok(Ok(suggestion)) => match validate_suggestion(&suggestion, catalog) {
                Ok(()) => {
                    info!(
                        "Generated learning path with {} modules",
                        suggestion.modules.len()
                    );
                    return LearningPathSuggestion {
                        source: SuggestionSource::Generated,
                        fallback_reason: None,
                        ..suggestion
                    };
                }
                Err(problem) => format!("generator reply is malformed: {problem}"),
            },
        };

        warn!("Learning path advisor falling back: {reason}");
        fallback::fallback_path(goal, gaps, catalog, &reason)
    }

    /// Summarizes the gap list, bounded by the configured timeout.
    pub async fn analyze_skill_gap(&self, goal: &AdvisorGoal, gaps: &[SkillGap]) -> GapAnalysis {
        let Some(generator) = &self.generator else {
            return fallback::fallback_analysis(goal, gaps);
        };

        let request = AdvisorRequest {
            goal: goal.clone(),
            skills: gaps.to_vec(),
            resources: Vec::new(),
        };

        match tokio::time::timeout(self.timeout, generator.analyze_skill_gap(&request)).await {
            Ok(Ok(analysis)) if !analysis.summary.trim().is_empty() => GapAnalysis {
                source: SuggestionSource::Generated,
                ..analysis
            },
            Ok(Ok(_)) => {
                warn!("Gap analysis reply had no summary; using fallback");
                fallback::fallback_analysis(goal, gaps)
            }
            Ok(Err(e)) => {
                warn!("Gap analysis failed: {e}; using fallback");
                fallback::fallback_analysis(goal, gaps)
            }
            Err(_) => {
                warn!(
                    "Gap analysis timed out after {}s; using fallback",
                    self.timeout.as_secs()
                );
                fallback::fallback_analysis(goal, gaps)
            }
        }
    }
}

/// A generated path must have modules, no empty module, and only catalog resources.
fn validate_suggestion(
    suggestion: &LearningPathSuggestion,
    catalog: &[LearningResource],
) -> Result<(), String> {
    if suggestion.modules.is_empty() {
        return Err("no modules".to_string());
    }
    let known: HashSet<Uuid> = catalog.iter().map(|r| r.id).collect();
    for module in &suggestion.modules {
        if module.resources.is_empty() {
            return Err(format!("module '{}' has no resources", module.title));
        }
        if let Some(unknown) = module
            .resources
            .iter()
            .find(|r| !known.contains(&r.resource_id))
        {
            return Err(format!(
                "module '{}' references unknown resource {}",
                module.title, unknown.resource_id
            ));
        }
    }
    Ok(())
}
