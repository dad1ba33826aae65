//! Posting summarization: one structured summary per posting, produced
//! once by the backfill and reused by every student-facing surface.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::annotate::prompts::{SUMMARIZE_PROMPT_TEMPLATE, SUMMARIZE_SYSTEM};
use crate::errors::PipelineError;
use crate::llm_client::payload::{as_object, optional_string, required_string, string_list};
use crate::llm_client::prompts::EXTRACTION_INSTRUCTION;
use crate::llm_client::{LlmClient, LlmError, LlmRequest};
use crate::models::opportunity::PostingText;

/// Posting text beyond this many characters is cut before prompting.
pub const MAX_POSTING_CHARS: usize = 2_000;
/// Display cap for the one-liner. Longer model output is truncated, not
/// rejected; the field is display copy.
pub const MAX_ONE_LINER_CHARS: usize = 200;

const SUMMARIZE_TEMPERATURE: f32 = 0.1;
const SUMMARIZE_MAX_TOKENS: u32 = 512;

/// Structured summary of one posting, persisted as JSONB by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpportunitySummary {
    pub one_liner: String,
    pub skills: Vec<String>,
    pub time_commitment: String,
    pub research_area: Option<String>,
}

impl OpportunitySummary {
    /// Validates an untrusted LLM payload into a summary. `one_liner` and
    /// `time_commitment` are required; the one-liner is cut to its display
    /// cap when the model overruns it.
    pub fn from_value(value: &Value) -> Result<Self, LlmError> {
        let obj = as_object(value, "summary")?;

        Ok(OpportunitySummary {
            one_liner: truncate_to_chars(
                required_string(obj, "one_liner")?,
                MAX_ONE_LINER_CHARS,
            ),
            skills: string_list(obj, "skills")?,
            time_commitment: required_string(obj, "time_commitment")?,
            research_area: optional_string(obj, "research_area")?,
        })
    }
}

/// Summarizes a posting's raw text using the LLM.
///
/// Callers assembling text from a stored posting should go through
/// `PostingText::raw_text` so the title survives the input cut.
pub async fn summarize_posting(
    raw_text: &str,
    llm: &LlmClient,
) -> Result<OpportunitySummary, PipelineError> {
    let clipped = clip_chars(raw_text, MAX_POSTING_CHARS);
    if clipped.trim().is_empty() {
        return Err(PipelineError::Validation(
            "posting text is empty".to_string(),
        ));
    }

    let prompt = SUMMARIZE_PROMPT_TEMPLATE
        .replace("{extraction_instruction}", EXTRACTION_INSTRUCTION)
        .replace("{posting_text}", clipped);
    let request = LlmRequest {
        system_instruction: SUMMARIZE_SYSTEM,
        user_content: &prompt,
        json_response_mode: true,
        temperature: SUMMARIZE_TEMPERATURE,
        max_output_tokens: SUMMARIZE_MAX_TOKENS,
    };

    let value = llm
        .generate_value(&request)
        .await
        .map_err(PipelineError::SummarizationFailure)?;
    let summary =
        OpportunitySummary::from_value(&value).map_err(PipelineError::SummarizationFailure)?;

    debug!(
        "Summarized posting: {} chars in, {} chars out",
        clipped.len(),
        summary.one_liner.len()
    );

    Ok(summary)
}

/// Seam between the backfill scheduler and the summarization service.
/// The production impl calls the LLM; tests swap in scripted fakes.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, posting: &PostingText<'_>)
        -> Result<OpportunitySummary, PipelineError>;
}

/// LLM-backed summarizer used in production.
pub struct LlmSummarizer {
    llm: LlmClient,
}

impl LlmSummarizer {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(
        &self,
        posting: &PostingText<'_>,
    ) -> Result<OpportunitySummary, PipelineError> {
        summarize_posting(&posting.raw_text(), &self.llm).await
    }
}

/// Cuts text to at most `max_chars` characters, on a char boundary.
/// Shared with the discipline tagger.
pub(crate) fn clip_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn truncate_to_chars(mut text: String, max_chars: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_full_payload() {
        let value = json!({
            "one_liner": "Build microfluidic devices for rapid diagnostics.",
            "skills": ["CAD", "PDMS fabrication"],
            "time_commitment": "8-10 hours/week",
            "research_area": "biomedical engineering"
        });

        let summary = OpportunitySummary::from_value(&value).unwrap();
        assert_eq!(
            summary.one_liner,
            "Build microfluidic devices for rapid diagnostics."
        );
        assert_eq!(summary.skills.len(), 2);
        assert_eq!(summary.time_commitment, "8-10 hours/week");
        assert_eq!(summary.research_area.as_deref(), Some("biomedical engineering"));
    }

    #[test]
    fn test_from_value_requires_one_liner() {
        let value = json!({"time_commitment": "5 hours/week"});
        let err = OpportunitySummary::from_value(&value).unwrap_err();
        assert!(matches!(err, LlmError::Schema(_)));
    }

    #[test]
    fn test_from_value_requires_time_commitment() {
        let value = json!({"one_liner": "Study corals."});
        assert!(OpportunitySummary::from_value(&value).is_err());
    }

    #[test]
    fn test_from_value_defaults_skills_and_area() {
        let value = json!({
            "one_liner": "Study coral bleaching in the field.",
            "time_commitment": "not specified"
        });
        let summary = OpportunitySummary::from_value(&value).unwrap();
        assert!(summary.skills.is_empty());
        assert!(summary.research_area.is_none());
    }

    #[test]
    fn test_from_value_cuts_overlong_one_liner() {
        let long = "x".repeat(MAX_ONE_LINER_CHARS + 50);
        let value = json!({"one_liner": long, "time_commitment": "tbd"});
        let summary = OpportunitySummary::from_value(&value).unwrap();
        assert_eq!(summary.one_liner.chars().count(), MAX_ONE_LINER_CHARS);
    }

    #[test]
    fn test_clip_chars_respects_char_boundaries() {
        let text = "héllo wörld";
        let clipped = clip_chars(text, 4);
        assert_eq!(clipped, "héll");
        assert_eq!(clip_chars("short", 100), "short");
    }

    #[tokio::test]
    async fn test_summarize_posting_rejects_empty_text() {
        let llm = LlmClient::with_base_url("test-key".to_string(), "http://127.0.0.1:9".to_string());
        let err = summarize_posting("   \n  ", &llm).await.unwrap_err();
        assert!(matches!(err, PipelineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_summarize_posting_end_to_end() {
        let mut server = mockito::Server::new_async().await;
        let payload = json!({
            "one_liner": "Assist with EEG data collection in a sleep lab.",
            "skills": ["EEG", "MATLAB"],
            "time_commitment": "6 hours/week",
            "research_area": "neuroscience"
        });
        let body = json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": payload.to_string()}]}}
            ]
        });
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let llm = LlmClient::with_base_url("test-key".to_string(), server.url());
        let summary = summarize_posting("Sleep Lab Research Assistant\n\nHelp collect EEG data.", &llm)
            .await
            .unwrap();

        assert_eq!(summary.research_area.as_deref(), Some("neuroscience"));
        assert_eq!(summary.skills, vec!["EEG", "MATLAB"]);
    }

    #[tokio::test]
    async fn test_summarize_posting_wraps_schema_failure() {
        let mut server = mockito::Server::new_async().await;
        // Valid JSON, wrong shape: missing both required fields.
        let body = json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "{\"notes\": \"n/a\"}"}]}}
            ]
        });
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let llm = LlmClient::with_base_url("test-key".to_string(), server.url());
        let err = summarize_posting("Some posting text", &llm).await.unwrap_err();
        assert!(matches!(err, PipelineError::SummarizationFailure(_)));
        assert!(!err.is_transient());
    }
}
