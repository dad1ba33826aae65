use std::time::Duration;

use crate::errors::PipelineError;

/// Delay inserted between consecutive LLM calls in a backfill run.
pub const DEFAULT_CALL_DELAY_MS: u64 = 400;
/// Upper bound on a single LLM request before it is abandoned.
pub const DEFAULT_LLM_TIMEOUT_SECS: u64 = 30;

/// Pipeline configuration loaded from environment variables.
///
/// The service credential is the only required value; a missing or empty
/// credential surfaces as `ConfigurationMissing` before any network call
/// is attempted.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub call_delay: Duration,
    pub llm_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            call_delay: Duration::from_millis(env_u64(
                "PIPELINE_CALL_DELAY_MS",
                DEFAULT_CALL_DELAY_MS,
            )?),
            llm_timeout: Duration::from_secs(env_u64(
                "PIPELINE_LLM_TIMEOUT_SECS",
                DEFAULT_LLM_TIMEOUT_SECS,
            )?),
        })
    }
}

fn require_env(key: &'static str) -> Result<String, PipelineError> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(PipelineError::ConfigurationMissing(key)),
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64, PipelineError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse::<u64>().map_err(|_| {
            PipelineError::Validation(format!("{key} must be a non-negative integer, got '{raw}'"))
        }),
        Err(_) => Ok(default),
    }
}
