// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common instruction substituted into all extraction prompts.
pub const EXTRACTION_INSTRUCTION: &str = "\
    CRITICAL: Use only information stated in the provided text. \
    Do NOT infer, interpolate, or invent details. \
    If the text does not state a field, return null for that field \
    (or an empty array for list fields).";
