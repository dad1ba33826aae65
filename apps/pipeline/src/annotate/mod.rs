// Annotation pipeline: posting summarization, discipline tagging, and the
// idempotent backfill that applies both across the catalog.
// All LLM calls go through llm_client, no direct API calls here.

pub mod backfill;
pub mod disciplines;
pub mod prompts;
pub mod summarize;
