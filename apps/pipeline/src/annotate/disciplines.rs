//! Discipline tagging against a closed vocabulary.
//!
//! The vocabulary is the contract between the pipeline and every filter,
//! badge, and notification preference downstream. Nothing outside it is
//! ever stored: out-of-vocabulary model output is discarded with a warning,
//! not treated as an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::annotate::prompts::DISCIPLINES_PROMPT_TEMPLATE;
use crate::annotate::summarize::{clip_chars, MAX_POSTING_CHARS};
use crate::errors::PipelineError;
use crate::llm_client::payload::{as_object, required_list};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{LlmClient, LlmRequest};
use crate::models::opportunity::PostingText;

/// The closed set of disciplines a posting may be tagged with.
/// Spellings here are canonical; stored tags always use them.
pub const DISCIPLINE_VOCABULARY: [&str; 22] = [
    "Aerospace Engineering",
    "Biomedical Engineering",
    "Chemical Engineering",
    "Civil Engineering",
    "Computer Engineering",
    "Electrical Engineering",
    "Environmental Engineering",
    "Industrial Engineering",
    "Materials Science",
    "Mechanical Engineering",
    "Computer Science",
    "Data Science",
    "Mathematics",
    "Statistics",
    "Physics",
    "Chemistry",
    "Biology",
    "Biochemistry",
    "Neuroscience",
    "Psychology",
    "Public Health",
    "Nursing",
];

/// A posting carries at most this many tags.
pub const MAX_DISCIPLINES: usize = 5;

const TAG_TEMPERATURE: f32 = 0.1;
const TAG_MAX_TOKENS: u32 = 256;

/// The validated tag set for one posting. `from_candidates` is the only
/// path from untrusted input into a stored set. Empty is a valid, final
/// outcome for postings no vocabulary entry fits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisciplineTagSet(Vec<String>);

impl DisciplineTagSet {
    /// Canonicalizes candidates against the vocabulary: case-insensitive
    /// match onto canonical spellings, duplicates dropped, capped at
    /// `MAX_DISCIPLINES`, candidate order (the model's ranking) kept.
    /// Anything outside the vocabulary is discarded with a warning.
    pub fn from_candidates<I, S>(candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tags: Vec<String> = Vec::new();
        for candidate in candidates {
            let candidate = candidate.as_ref().trim();
            match canonical_discipline(candidate) {
                Some(canonical) => {
                    if !tags.iter().any(|t| t == canonical) {
                        tags.push(canonical.to_string());
                        if tags.len() == MAX_DISCIPLINES {
                            break;
                        }
                    }
                }
                None if candidate.is_empty() => {}
                None => warn!("Discarding tag outside the discipline vocabulary: '{candidate}'"),
            }
        }
        DisciplineTagSet(tags)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

/// Maps a candidate onto its canonical vocabulary spelling, if any.
pub fn canonical_discipline(candidate: &str) -> Option<&'static str> {
    let lowered = candidate.trim().to_lowercase();
    DISCIPLINE_VOCABULARY
        .iter()
        .find(|d| d.to_lowercase() == lowered)
        .copied()
}

fn vocabulary_listing() -> String {
    DISCIPLINE_VOCABULARY.join(", ")
}

/// Classifies a posting into vocabulary disciplines using the LLM.
///
/// Service and schema failures are errors; an empty set is not. The
/// distinction matters to the backfill, which must never mark a posting
/// as tagged when the tagging call itself failed.
pub async fn tag_disciplines(
    posting: &PostingText<'_>,
    llm: &LlmClient,
) -> Result<DisciplineTagSet, PipelineError> {
    let text = posting.raw_text();
    let prompt = DISCIPLINES_PROMPT_TEMPLATE
        .replace("{vocabulary}", &vocabulary_listing())
        .replace("{posting_text}", clip_chars(&text, MAX_POSTING_CHARS));
    let request = LlmRequest {
        system_instruction: JSON_ONLY_SYSTEM,
        user_content: &prompt,
        json_response_mode: true,
        temperature: TAG_TEMPERATURE,
        max_output_tokens: TAG_MAX_TOKENS,
    };

    let value = llm
        .generate_value(&request)
        .await
        .map_err(PipelineError::TaggingFailure)?;
    let obj = as_object(&value, "discipline").map_err(PipelineError::TaggingFailure)?;
    let candidates = required_list(obj, "disciplines").map_err(PipelineError::TaggingFailure)?;

    let tags = DisciplineTagSet::from_candidates(&candidates);
    debug!(
        "Tagged posting '{}': kept {} of {} candidates",
        posting.title,
        tags.len(),
        candidates.len()
    );

    Ok(tags)
}

/// Seam between the backfill scheduler and the tagging service.
#[async_trait]
pub trait Tagger: Send + Sync {
    async fn tag(&self, posting: &PostingText<'_>) -> Result<DisciplineTagSet, PipelineError>;
}

/// LLM-backed tagger used in production.
pub struct LlmTagger {
    llm: LlmClient,
}

impl LlmTagger {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Tagger for LlmTagger {
    async fn tag(&self, posting: &PostingText<'_>) -> Result<DisciplineTagSet, PipelineError> {
        tag_disciplines(posting, &self.llm).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vocabulary_has_no_duplicates() {
        let mut seen = std::collections::HashSet::new();
        for entry in DISCIPLINE_VOCABULARY {
            assert!(seen.insert(entry.to_lowercase()), "duplicate entry: {entry}");
        }
        assert_eq!(DISCIPLINE_VOCABULARY.len(), 22);
    }

    #[test]
    fn test_canonical_discipline_is_case_insensitive() {
        assert_eq!(
            canonical_discipline("biomedical engineering"),
            Some("Biomedical Engineering")
        );
        assert_eq!(canonical_discipline("  PHYSICS  "), Some("Physics"));
        assert_eq!(canonical_discipline("Drug Delivery"), None);
    }

    #[test]
    fn test_from_candidates_filters_outside_vocabulary() {
        // A drug-delivery materials posting: the invented label is dropped,
        // the vocabulary entries survive in order.
        let tags = DisciplineTagSet::from_candidates([
            "Biomedical Engineering",
            "Drug Delivery",
            "Mechanical Engineering",
        ]);
        assert_eq!(
            tags.as_slice(),
            ["Biomedical Engineering", "Mechanical Engineering"]
        );
    }

    #[test]
    fn test_from_candidates_canonicalizes_and_dedupes() {
        let tags = DisciplineTagSet::from_candidates(["physics", "Physics", "PHYSICS", "chemistry"]);
        assert_eq!(tags.as_slice(), ["Physics", "Chemistry"]);
    }

    #[test]
    fn test_from_candidates_caps_at_five() {
        let tags = DisciplineTagSet::from_candidates([
            "Physics",
            "Chemistry",
            "Biology",
            "Mathematics",
            "Statistics",
            "Neuroscience",
            "Psychology",
        ]);
        assert_eq!(tags.len(), MAX_DISCIPLINES);
        assert_eq!(tags.as_slice()[0], "Physics");
        assert_eq!(tags.as_slice()[4], "Statistics");
    }

    #[test]
    fn test_from_candidates_empty_is_valid() {
        let tags = DisciplineTagSet::from_candidates(Vec::<String>::new());
        assert!(tags.is_empty());
    }

    #[test]
    fn test_tag_set_serializes_as_plain_array() {
        let tags = DisciplineTagSet::from_candidates(["Physics"]);
        assert_eq!(serde_json::to_value(&tags).unwrap(), json!(["Physics"]));
    }

    #[tokio::test]
    async fn test_tag_disciplines_end_to_end_filters_model_output() {
        let mut server = mockito::Server::new_async().await;
        let payload = json!({
            "disciplines": ["biomedical engineering", "Tissue Engineering", "Mechanical Engineering"]
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
        let posting = PostingText {
            title: "Prosthetic Joint Design",
            description: "Design and test load-bearing prosthetic joints.",
            eligibility: None,
        };
        let tags = tag_disciplines(&posting, &llm).await.unwrap();

        assert_eq!(
            tags.as_slice(),
            ["Biomedical Engineering", "Mechanical Engineering"]
        );
    }

    #[tokio::test]
    async fn test_tag_disciplines_missing_key_is_schema_failure() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "{\"tags\": []}"}]}}
            ]
        });
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-2.0-flash:generateContent")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let llm = LlmClient::with_base_url("test-key".to_string(), server.url());
        let posting = PostingText {
            title: "Any",
            description: "Any",
            eligibility: None,
        };
        let err = tag_disciplines(&posting, &llm).await.unwrap_err();
        assert!(matches!(err, PipelineError::TaggingFailure(_)));
    }
}
