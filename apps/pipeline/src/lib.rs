//! Scout pipeline: summarization, discipline tagging, and recommendation
//! matching for a student research-opportunity catalog.
//!
//! The crate exposes three LLM-backed extraction services (student profile,
//! posting summary, discipline tags), a paced backfill scheduler that keeps
//! the catalog annotated, and a deterministic matching engine that ranks
//! the annotated catalog for a profile. The library never installs a
//! tracing subscriber; the embedding application owns that.

pub mod annotate;
pub mod config;
pub mod errors;
pub mod llm_client;
pub mod matching;
pub mod models;
pub mod profile;
pub mod store;

pub use annotate::backfill::{BackfillKind, BackfillRun, BackfillScheduler};
pub use annotate::disciplines::{
    tag_disciplines, DisciplineTagSet, LlmTagger, Tagger, DISCIPLINE_VOCABULARY,
};
pub use annotate::summarize::{summarize_posting, LlmSummarizer, OpportunitySummary, Summarizer};
pub use config::Config;
pub use errors::PipelineError;
pub use llm_client::LlmClient;
pub use matching::scorer::{LexicalScorer, LlmRelevanceScorer, RelevanceScorer};
pub use matching::{rank_matches, rank_matches_with, MatchResult};
pub use models::opportunity::{CatalogItem, OpportunityRow, PostingText};
pub use profile::{extract_profile, StudentProfile};
pub use store::memory::MemoryCatalog;
pub use store::{CatalogStore, PgCatalogStore};
