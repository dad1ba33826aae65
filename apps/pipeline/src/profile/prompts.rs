// All LLM prompt constants for the profile extraction module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for profile extraction. Enforces JSON-only output.
pub const PROFILE_EXTRACT_SYSTEM: &str =
    "You are an expert resume analyst for a student research-opportunity tracker. \
    Extract a structured student profile from resume text. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Profile extraction prompt template.
/// Replace `{extraction_instruction}` and `{resume_text}` before sending.
pub const PROFILE_EXTRACT_PROMPT_TEMPLATE: &str = r#"{extraction_instruction}

Extract a student profile from the resume below.

Return a JSON object with this EXACT schema (no extra fields):
{
  "name": "Jordan Lee",
  "major": "Computer Science",
  "graduation_year": "2027",
  "research_interests": ["machine learning", "computational neuroscience"],
  "skills": ["Python", "PyTorch", "data analysis"],
  "summary": "Third-year CS student with coursework in ML and signal processing."
}

Rules:
- Any field except the two arrays may be null when the resume does not state it.
- "research_interests": topics the student wants to work on, most prominent first.
- "skills": concrete tools, languages, techniques, and lab methods.
- "summary": at most two sentences, built only from the resume's own content.

RESUME:
{resume_text}"#;
