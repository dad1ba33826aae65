use thiserror::Error;

use crate::llm_client::LlmError;

/// Pipeline-level error type returned by every public operation.
///
/// The per-operation variants (`ParseFailure`, `SummarizationFailure`,
/// `TaggingFailure`, `MatchingFailure`) keep the underlying `LlmError` as
/// their source so callers can tell a transient service failure from a
/// malformed payload.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Required environment variable '{0}' is not set")]
    ConfigurationMissing(&'static str),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Profile extraction failed: {0}")]
    ParseFailure(#[source] LlmError),

    #[error("Summarization failed: {0}")]
    SummarizationFailure(#[source] LlmError),

    #[error("Discipline tagging failed: {0}")]
    TaggingFailure(#[source] LlmError),

    #[error("Relevance scoring failed: {0}")]
    MatchingFailure(#[source] LlmError),

    #[error("Database error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    /// True when the failure is a transient service condition (timeout,
    /// overload, transport) that a caller may reasonably retry. Schema and
    /// validation failures are not transient: retrying the same input is
    /// unlikely to change the outcome.
    pub fn is_transient(&self) -> bool {
        match self {
            PipelineError::ParseFailure(e)
            | PipelineError::SummarizationFailure(e)
            | PipelineError::TaggingFailure(e)
            | PipelineError::MatchingFailure(e) => e.is_transient(),
            _ => false,
        }
    }
}
