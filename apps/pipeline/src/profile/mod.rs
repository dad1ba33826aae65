//! Profile extraction: turns raw resume text into a structured student
//! profile used by the matching engine. The profile is computed on demand
//! and never persisted by this crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::errors::PipelineError;
use crate::llm_client::payload::{as_object, optional_string, string_list, year_string};
use crate::llm_client::prompts::EXTRACTION_INSTRUCTION;
use crate::llm_client::{LlmClient, LlmError, LlmRequest};
use crate::profile::prompts::{PROFILE_EXTRACT_PROMPT_TEMPLATE, PROFILE_EXTRACT_SYSTEM};

pub mod prompts;

/// Resumes with fewer non-whitespace characters than this are rejected
/// before any service call; they cannot yield a meaningful profile.
pub const MIN_RESUME_CHARS: usize = 40;

const EXTRACT_TEMPERATURE: f32 = 0.2;
const EXTRACT_MAX_TOKENS: u32 = 1024;

/// Structured view of a student, extracted from an uploaded resume.
/// Every scalar field is optional; extraction never invents values the
/// resume does not state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub name: Option<String>,
    pub major: Option<String>,
    pub graduation_year: Option<String>,
    /// Ordered by prominence in the resume.
    pub research_interests: Vec<String>,
    /// Deduplicated case-insensitively, first spelling wins.
    pub skills: Vec<String>,
    pub summary: Option<String>,
}

impl StudentProfile {
    /// Validates an untrusted LLM payload into a profile.
    pub fn from_value(value: &Value) -> Result<Self, LlmError> {
        let obj = as_object(value, "profile")?;

        Ok(StudentProfile {
            name: optional_string(obj, "name")?,
            major: optional_string(obj, "major")?,
            graduation_year: year_string(obj, "graduation_year")?,
            research_interests: string_list(obj, "research_interests")?,
            skills: dedupe_case_insensitive(string_list(obj, "skills")?),
            summary: optional_string(obj, "summary")?,
        })
    }
}

fn dedupe_case_insensitive(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.to_lowercase()))
        .collect()
}

/// Extracts a structured profile from resume text using the LLM.
pub async fn extract_profile(
    resume_text: &str,
    llm: &LlmClient,
) -> Result<StudentProfile, PipelineError> {
    let content_chars = resume_text.chars().filter(|c| !c.is_whitespace()).count();
    if content_chars < MIN_RESUME_CHARS {
        return Err(PipelineError::Validation(format!(
            "resume text too short to extract a profile \
             ({content_chars} non-whitespace chars, need {MIN_RESUME_CHARS})"
        )));
    }

    let prompt = PROFILE_EXTRACT_PROMPT_TEMPLATE
        .replace("{extraction_instruction}", EXTRACTION_INSTRUCTION)
        .replace("{resume_text}", resume_text);
    let request = LlmRequest {
        system_instruction: PROFILE_EXTRACT_SYSTEM,
        user_content: &prompt,
        json_response_mode: true,
        temperature: EXTRACT_TEMPERATURE,
        max_output_tokens: EXTRACT_MAX_TOKENS,
    };

    let value = llm
        .generate_value(&request)
        .await
        .map_err(PipelineError::ParseFailure)?;
    let profile = StudentProfile::from_value(&value).map_err(PipelineError::ParseFailure)?;

    debug!(
        "Extracted profile: {} interests, {} skills",
        profile.research_interests.len(),
        profile.skills.len()
    );

    Ok(profile)
}
