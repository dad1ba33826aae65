//! LLM client: the single point of entry for all Gemini API calls in Scout.
//!
//! ARCHITECTURAL RULE: No other module may call the Gemini API directly.
//! All LLM interactions MUST go through this module.
//!
//! Model: gemini-2.0-flash (hardcoded, do not make configurable to prevent drift)
//!
//! The client makes exactly one attempt per request. Transient failures
//! surface as typed errors and the caller decides whether to retry; the
//! backfill scheduler counts them instead of retrying so a batch run never
//! multiplies its own rate-limit pressure.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{Config, DEFAULT_LLM_TIMEOUT_SECS};

pub mod payload;
pub mod prompts;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
/// The model used for all LLM calls in Scout.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Schema violation: {0}")]
    Schema(String),

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// True for failures a caller may reasonably retry: timeouts, transport
    /// errors, and overload/server statuses. Malformed payloads are not
    /// transient.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Http(_) | LlmError::Timeout(_) => true,
            LlmError::Api { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            LlmError::Parse(_) | LlmError::Schema(_) | LlmError::EmptyContent => false,
        }
    }
}

/// One structured-generation request. Every field of the contract is
/// explicit so each component states its own temperature and token budget.
#[derive(Debug, Clone)]
pub struct LlmRequest<'a> {
    pub system_instruction: &'a str,
    pub user_content: &'a str,
    pub json_response_mode: bool,
    pub temperature: f32,
    pub max_output_tokens: u32,
}

// Wire types for the generateContent endpoint. Kept private: callers hand
// over an `LlmRequest` and get text or JSON back.

#[derive(Debug, Serialize)]
struct GeminiRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: ContentPayload<'a>,
    contents: Vec<ContentPayload<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct ContentPayload<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

impl<'a> GeminiRequest<'a> {
    fn from_request(request: &LlmRequest<'a>) -> Self {
        GeminiRequest {
            system_instruction: ContentPayload {
                role: None,
                parts: vec![TextPart {
                    text: request.system_instruction,
                }],
            },
            contents: vec![ContentPayload {
                role: Some("user"),
                parts: vec![TextPart {
                    text: request.user_content,
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
                response_mime_type: request
                    .json_response_mode
                    .then_some("application/json"),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "usageMetadata")]
    usage: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageMetadata {
    #[serde(rename = "promptTokenCount", default)]
    prompt_tokens: u32,
    #[serde(rename = "candidatesTokenCount", default)]
    output_tokens: u32,
}

impl GeminiResponse {
    /// Extracts the text of the first candidate's first text part.
    fn text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.iter().find_map(|p| p.text.as_deref()))
    }
}

#[derive(Debug, Deserialize)]
struct GeminiApiError {
    error: GeminiApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiApiErrorBody {
    message: String,
}

/// The single LLM client used by all services in Scout.
/// Wraps the Gemini generateContent API with structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, GEMINI_API_BASE.to_string())
    }

    /// Builds the client from pipeline configuration. `Config::from_env`
    /// has already rejected a missing credential at this point.
    pub fn from_config(config: &Config) -> Self {
        Self {
            client: build_http_client(config.llm_timeout),
            api_key: config.gemini_api_key.clone(),
            base_url: GEMINI_API_BASE.to_string(),
            timeout: config.llm_timeout,
        }
    }

    /// Points the client at an alternative endpoint (tests, proxies).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let timeout = Duration::from_secs(DEFAULT_LLM_TIMEOUT_SECS);
        Self {
            client: build_http_client(timeout),
            api_key,
            base_url,
            timeout,
        }
    }

    /// Makes a single call to the Gemini API and returns the generated text.
    pub async fn generate(&self, request: &LlmRequest<'_>) -> Result<String, LlmError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            MODEL
        );
        let request_body = GeminiRequest::from_request(request);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout.as_secs())
                } else {
                    LlmError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            // Try to parse the structured error message
            let message = serde_json::from_str::<GeminiApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let gemini_response: GeminiResponse = response.json().await?;

        if let Some(usage) = &gemini_response.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, output_tokens={}",
                usage.prompt_tokens, usage.output_tokens
            );
        }

        match gemini_response.text() {
            Some(text) => Ok(text.to_string()),
            None => Err(LlmError::EmptyContent),
        }
    }

    /// Calls the LLM and parses the text response as untyped JSON.
    /// Callers validate the `Value` into their own types; no field crosses
    /// the service boundary without an explicit check.
    pub async fn generate_value(&self, request: &LlmRequest<'_>) -> Result<Value, LlmError> {
        let text = self.generate(request).await?;

        // Strip markdown code fences if the model wraps JSON in them
        let text = strip_json_fences(&text);

        serde_json::from_str(text).map_err(LlmError::Parse)
    }
}

fn build_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .expect("Failed to build HTTP client")
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

    fn sample_request<'a>() -> LlmRequest<'a> {
        LlmRequest {
            system_instruction: "Respond with JSON only.",
            user_content: "Summarize this posting.",
            json_response_mode: true,
            temperature: 0.1,
            max_output_tokens: 512,
        }
    }

    fn candidate_body(text: &str) -> String {
        json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": text}]}}
            ],
            "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 34}
        })
        .to_string()
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_request_body_carries_full_contract() {
        let request = sample_request();
        let body = serde_json::to_value(GeminiRequest::from_request(&request)).unwrap();

        assert_eq!(
            body.pointer("/systemInstruction/parts/0/text").unwrap(),
            "Respond with JSON only."
        );
        assert_eq!(body.pointer("/contents/0/role").unwrap(), "user");
        assert_eq!(
            body.pointer("/contents/0/parts/0/text").unwrap(),
            "Summarize this posting."
        );
        assert_eq!(
            body.pointer("/generationConfig/responseMimeType").unwrap(),
            "application/json"
        );
        assert_eq!(
            body.pointer("/generationConfig/maxOutputTokens").unwrap(),
            512
        );
        let temperature = body
            .pointer("/generationConfig/temperature")
            .and_then(|t| t.as_f64())
            .unwrap();
        assert!((temperature - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_plain_text_request_omits_response_mime_type() {
        let request = LlmRequest {
            json_response_mode: false,
            ..sample_request()
        };
        let body = serde_json::to_value(GeminiRequest::from_request(&request)).unwrap();
        assert!(body.pointer("/generationConfig/responseMimeType").is_none());
    }

    #[tokio::test]
    async fn test_generate_returns_candidate_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", GENERATE_PATH)
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(candidate_body("hello from the model"))
            .create_async()
            .await;

        let client = LlmClient::with_base_url("test-key".to_string(), server.url());
        let text = client.generate(&sample_request()).await.unwrap();

        assert_eq!(text, "hello from the model");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_maps_server_error_to_api() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .with_status(503)
            .with_body(r#"{"error": {"code": 503, "message": "overloaded", "status": "UNAVAILABLE"}}"#)
            .create_async()
            .await;

        let client = LlmClient::with_base_url("test-key".to_string(), server.url());
        let err = client.generate(&sample_request()).await.unwrap_err();

        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_generate_empty_candidates_is_empty_content() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .with_status(200)
            .with_body(r#"{"candidates": []}"#)
            .create_async()
            .await;

        let client = LlmClient::with_base_url("test-key".to_string(), server.url());
        let err = client.generate(&sample_request()).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
    }

    #[tokio::test]
    async fn test_generate_value_strips_fences_and_parses() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .with_status(200)
            .with_body(candidate_body("```json\n{\"answer\": 42}\n```"))
            .create_async()
            .await;

        let client = LlmClient::with_base_url("test-key".to_string(), server.url());
        let value = client.generate_value(&sample_request()).await.unwrap();
        assert_eq!(value["answer"], 42);
    }

    #[tokio::test]
    async fn test_generate_value_rejects_non_json_output() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", GENERATE_PATH)
            .with_status(200)
            .with_body(candidate_body("I could not produce JSON, sorry."))
            .create_async()
            .await;

        let client = LlmClient::with_base_url("test-key".to_string(), server.url());
        let err = client.generate_value(&sample_request()).await.unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Timeout(30).is_transient());
        assert!(LlmError::Api {
            status: 429,
            message: "quota".to_string()
        }
        .is_transient());
        assert!(LlmError::Api {
            status: 500,
            message: "boom".to_string()
        }
        .is_transient());
        assert!(!LlmError::Api {
            status: 400,
            message: "bad request".to_string()
        }
        .is_transient());
        assert!(!LlmError::EmptyContent.is_transient());
        assert!(!LlmError::Schema("missing field".to_string()).is_transient());
    }
}
