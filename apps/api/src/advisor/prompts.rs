// Prompt constants for the learning path advisor.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Learning path prompt. Replace `{goal_json}`, `{skills_json}`,
/// `{catalog_json}` and `{catalog_rule}` before sending.
pub const PATH_PROMPT_TEMPLATE: &str = r#"Design a learning path for a professional working toward a career goal.

GOAL:
{goal_json}

SKILL GAPS (percentage = share of the target level already reached):
{skills_json}

RESOURCE CATALOG:
{catalog_json}

Return a JSON object with this EXACT schema (no extra fields):
{
  "title": "Path to Data Engineer",
  "modules": [
    {"title": "Foundation", "resourceIds": ["<catalog id>"]}
  ]
}

Rules:
- Order modules from foundational to advanced.
- Address the skills with the lowest percentage first.
- Every module must list at least one resource.
- {catalog_rule}"#;

/// Gap analysis prompt. Replace `{goal_json}` and `{skills_json}` before sending.
pub const GAP_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Review a professional's skill gaps against their career goal.

GOAL:
{goal_json}

SKILL GAPS (percentage = share of the target level already reached):
{skills_json}

Return a JSON object with this EXACT schema (no extra fields):
{
  "summary": "One or two sentences on overall readiness.",
  "prioritySkills": ["<skillId>"],
  "recommendations": ["Concrete next step."]
}

Rules:
- prioritySkills must only contain skillId values from the list above, most urgent first.
- At most 5 recommendations."#;
