//! Prompt template for the LLM relevance judge.

pub const RELEVANCE_PROMPT_TEMPLATE: &str = r#"You are scoring research opportunities for one student. You are given the student's profile and a catalog of summarized opportunities, both as JSON.

STUDENT PROFILE:
{profile_json}

OPPORTUNITY CATALOG:
{catalog_json}

Score how relevant each opportunity is to this student's interests, skills, and major.

Return a JSON object with this EXACT structure:
{
  "scores": [
    {
      "id": "the opportunity id, copied exactly from the catalog",
      "score": 85,
      "rationale": "One short sentence naming the strongest connection, or null if there is none."
    }
  ]
}

Rules:
- "score" must be an integer from 0 (no connection) to 100 (ideal fit).
- Include every catalog opportunity exactly once. Never invent ids.
- Judge only from the profile and catalog given above.
- Keep each rationale to one sentence."#;
