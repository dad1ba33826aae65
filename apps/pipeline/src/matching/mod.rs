//! Recommendation matching: ranks a summarized catalog against a student
//! profile. Ranking is recomputed per request from current inputs and is
//! fully deterministic for a given profile and catalog.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::matching::scorer::{LexicalScorer, RelevanceScorer};
use crate::models::opportunity::CatalogItem;
use crate::profile::StudentProfile;

pub mod prompts;
pub mod scorer;

/// Bounds on the requested result count. Out-of-range requests are
/// clamped, not rejected.
pub const MIN_TOP_N: usize = 1;
pub const MAX_TOP_N: usize = 20;

/// One ranked recommendation. Ephemeral: recomputed per request, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub opportunity_id: Uuid,
    /// 0 to 100.
    pub score: f64,
    pub rationale: Option<String>,
}

/// Ranks the catalog for a profile with the default deterministic scorer.
pub async fn rank_matches(
    profile: &StudentProfile,
    catalog: &[CatalogItem],
    top_n: usize,
) -> Result<Vec<MatchResult>, PipelineError> {
    rank_matches_with(&LexicalScorer, profile, catalog, top_n).await
}

/// Ranks the catalog with an explicit scorer backend.
///
/// Ordering is total: score descending, then posting recency descending,
/// then id ascending, so equal inputs always produce the same list. An
/// empty catalog yields an empty list, not an error.
pub async fn rank_matches_with(
    scorer: &dyn RelevanceScorer,
    profile: &StudentProfile,
    catalog: &[CatalogItem],
    top_n: usize,
) -> Result<Vec<MatchResult>, PipelineError> {
    if catalog.is_empty() {
        return Ok(vec![]);
    }

    let top_n = top_n.clamp(MIN_TOP_N, MAX_TOP_N);
    let mut results = scorer.score(profile, catalog).await?;

    let recency: HashMap<Uuid, DateTime<Utc>> =
        catalog.iter().map(|item| (item.id, item.posted_at)).collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                recency
                    .get(&b.opportunity_id)
                    .cmp(&recency.get(&a.opportunity_id))
            })
            .then_with(|| a.opportunity_id.cmp(&b.opportunity_id))
    });
    results.truncate(top_n);

    debug!("Ranked {} of {} catalog items", results.len(), catalog.len());
    Ok(results)
}
