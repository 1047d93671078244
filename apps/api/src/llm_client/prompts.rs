// Cross-cutting prompt fragments. Each caller keeps its own prompts.rs
// alongside it and builds on these.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps the model inside the catalog it was given.
pub const CATALOG_ONLY_INSTRUCTION: &str = "\
    CRITICAL: Only reference resources by the exact `id` values listed in the catalog. \
    Do NOT invent resources, links or ids. \
    If no catalog resource fits a skill, leave that skill out.";
