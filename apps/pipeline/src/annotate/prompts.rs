// All LLM prompt constants for the annotation module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for posting summarization. Enforces JSON-only output.
pub const SUMMARIZE_SYSTEM: &str =
    "You are an expert analyst of university research opportunity postings. \
    Condense a posting into a short structured summary for undergraduates. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Summarization prompt template.
/// Replace `{extraction_instruction}` and `{posting_text}` before sending.
pub const SUMMARIZE_PROMPT_TEMPLATE: &str = r#"{extraction_instruction}

Summarize the research opportunity posting below for a student-facing catalog card.

Return a JSON object with this EXACT schema (no extra fields):
{
  "one_liner": "Build microfluidic devices for rapid diagnostics in a biomedical engineering lab.",
  "skills": ["CAD", "PDMS fabrication", "pipetting"],
  "time_commitment": "8-10 hours/week",
  "research_area": "biomedical engineering"
}

Rules:
- "one_liner": one sentence, at most 200 characters, plain language for undergraduates.
- "skills": the specific skills the posting asks for; empty array when it lists none.
- "time_commitment": the posting's stated commitment; write "not specified" when unstated.
- "research_area": the field of research, or null when unclear.

POSTING:
{posting_text}"#;

/// Discipline classification prompt template.
/// Replace `{vocabulary}` and `{posting_text}` before sending.
pub const DISCIPLINES_PROMPT_TEMPLATE: &str = r#"Classify the research opportunity posting below into academic disciplines.

Choose ONLY from this vocabulary, using the exact spellings given:
{vocabulary}

Rules:
- Prefer the most specific applicable discipline: a posting about neural signal
  processing is "Neuroscience", not "Biology".
- Interdisciplinary postings may carry several disciplines.
- Return at most 5 disciplines, ranked most relevant first.
- If no vocabulary entry applies, return an empty array.

Return a JSON object with this EXACT schema:
{
  "disciplines": ["Biomedical Engineering", "Mechanical Engineering"]
}

POSTING:
{posting_text}"#;
