use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::annotate::summarize::OpportunitySummary;

/// Only postings in this status are eligible for annotation and matching.
pub const STATUS_RECRUITING: &str = "recruiting";

/// A catalog row as stored. `summary` is the JSONB structured summary and
/// `disciplines` the tag array; both are nullable so "never annotated"
/// (NULL) stays distinguishable from "annotated with an empty result".
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OpportunityRow {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub eligibility: Option<String>,
    pub status: String,
    pub summary: Option<Value>,
    pub disciplines: Option<Vec<String>>,
    pub posted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Borrowed view of the posting fields the annotation services read.
#[derive(Debug, Clone)]
pub struct PostingText<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub eligibility: Option<&'a str>,
}

impl<'a> From<&'a OpportunityRow> for PostingText<'a> {
    fn from(row: &'a OpportunityRow) -> Self {
        PostingText {
            title: &row.title,
            description: &row.description,
            eligibility: row.eligibility.as_deref(),
        }
    }
}

impl PostingText<'_> {
    /// Joins the posting fields into the raw text handed to the LLM.
    /// Title comes first so downstream truncation never drops it.
    pub fn raw_text(&self) -> String {
        let mut text = format!("{}\n\n{}", self.title, self.description);
        if let Some(eligibility) = self.eligibility {
            text.push_str("\n\nEligibility: ");
            text.push_str(eligibility);
        }
        text
    }
}

/// A summarized posting as fed to the matching engine. Carries the recency
/// used for deterministic tie-breaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    pub posted_at: DateTime<Utc>,
    pub summary: OpportunitySummary,
}
