use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::advisor::prompts::{GAP_ANALYSIS_PROMPT_TEMPLATE, PATH_PROMPT_TEMPLATE};
use crate::advisor::{
    AdvisorError, AdvisorRequest, GapAnalysis, LearningPathSuggestion, PathGenerator,
    SuggestedModule, SuggestedResource, SuggestionSource,
};
use crate::llm_client::prompts::{CATALOG_ONLY_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::llm_client::LlmClient;
use crate::models::learning::LearningResource;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPath {
    title: String,
    modules: Vec<RawModule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawModule {
    title: String,
    resource_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    summary: String,
    #[serde(default)]
    priority_skills: Vec<Uuid>,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// `PathGenerator` backed by the hosted model.
pub struct LlmPathGenerator {
    llm: LlmClient,
}

impl LlmPathGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, AdvisorError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| AdvisorError::Malformed(format!("failed to encode request: {e}")))
}

/// Resolves the model's resource ids against the catalog it was given.
fn resolve_path(
    raw: RawPath,
    catalog: &[LearningResource],
) -> Result<LearningPathSuggestion, AdvisorError> {
    let by_id: HashMap<Uuid, &LearningResource> = catalog.iter().map(|r| (r.id, r)).collect();

    let modules = raw
        .modules
        .into_iter()
        .map(|module| {
            let resources = module
                .resource_ids
                .iter()
                .map(|id| {
                    by_id
                        .get(id)
                        .map(|r| SuggestedResource {
                            resource_id: r.id,
                            title: r.title.clone(),
                            resource_type: r.resource_type.clone(),
                        })
                        .ok_or_else(|| {
                            AdvisorError::Malformed(format!("unknown resource {id}"))
                        })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(SuggestedModule {
                title: module.title,
                resources,
            })
        })
        .collect::<Result<Vec<_>, AdvisorError>>()?;

    Ok(LearningPathSuggestion {
        title: raw.title,
        modules,
        source: SuggestionSource::Generated,
        fallback_reason: None,
    })
}

#[async_trait]
impl PathGenerator for LlmPathGenerator {
    async fn generate_learning_path(
        &self,
        request: &AdvisorRequest,
    ) -> Result<LearningPathSuggestion, AdvisorError> {
        let prompt = PATH_PROMPT_TEMPLATE
            .replace("{goal_json}", &to_json(&request.goal)?)
            .replace("{skills_json}", &to_json(&request.skills)?)
            .replace("{catalog_json}", &to_json(&request.resources)?)
            .replace("{catalog_rule}", CATALOG_ONLY_INSTRUCTION);

        debug!(
            "Requesting learning path: {} skills, {} catalog resources",
            request.skills.len(),
            request.resources.len()
        );
        let raw: RawPath = self.llm.call_json(&prompt, JSON_ONLY_SYSTEM).await?;
        let suggestion = resolve_path(raw, &request.resources)?;
        info!(
            "Model proposed learning path '{}' with {} modules",
            suggestion.title,
            suggestion.modules.len()
        );
        Ok(suggestion)
    }

    async fn analyze_skill_gap(
        &self,
        request: &AdvisorRequest,
    ) -> Result<GapAnalysis, AdvisorError> {
        let prompt = GAP_ANALYSIS_PROMPT_TEMPLATE
            .replace("{goal_json}", &to_json(&request.goal)?)
            .replace("{skills_json}", &to_json(&request.skills)?);

        let raw: RawAnalysis = self.llm.call_json(&prompt, JSON_ONLY_SYSTEM).await?;
        let known: Vec<Uuid> = request.skills.iter().map(|s| s.skill_id).collect();
        if let Some(unknown) = raw.priority_skills.iter().find(|id| !known.contains(id)) {
            return Err(AdvisorError::Malformed(format!("unknown skill {unknown}")));
        }

        Ok(GapAnalysis {
            summary: raw.summary,
            priority_skills: raw.priority_skills,
            recommendations: raw.recommendations,
            source: SuggestionSource::Generated,
        })
    }
}
