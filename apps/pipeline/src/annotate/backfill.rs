//! Idempotent catalog backfill.
//!
//! Selects recruiting postings that still miss an annotation, processes
//! them strictly one at a time, and pauses after every call so a run stays
//! inside the provider's per-minute quota. Item failures are counted and
//! skipped; only candidate selection can fail a run. Because selection is
//! "attribute IS NULL" and persists are unconditional, re-running after a
//! crash or a partial failure picks up exactly the unfinished rows.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::annotate::disciplines::{LlmTagger, Tagger};
use crate::annotate::summarize::{LlmSummarizer, Summarizer};
use crate::errors::PipelineError;
use crate::llm_client::LlmClient;
use crate::models::opportunity::{OpportunityRow, PostingText};
use crate::store::CatalogStore;

/// Which missing attribute a backfill run fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackfillKind {
    Summary,
    Disciplines,
}

impl fmt::Display for BackfillKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackfillKind::Summary => write!(f, "summary"),
            BackfillKind::Disciplines => write!(f, "disciplines"),
        }
    }
}

/// Outcome of one backfill run. `total` counts every selected candidate,
/// `succeeded` the ones annotated and persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillRun {
    pub kind: BackfillKind,
    pub total: usize,
    pub succeeded: usize,
}

impl BackfillRun {
    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }
}

/// Runs annotation backfills over the catalog.
///
/// The inter-call delay is injected state rather than a global: schedulers
/// tune it from config, tests run with zero.
pub struct BackfillScheduler {
    store: Arc<dyn CatalogStore>,
    summarizer: Arc<dyn Summarizer>,
    tagger: Arc<dyn Tagger>,
    call_delay: Duration,
}

impl BackfillScheduler {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        summarizer: Arc<dyn Summarizer>,
        tagger: Arc<dyn Tagger>,
        call_delay: Duration,
    ) -> Self {
        Self {
            store,
            summarizer,
            tagger,
            call_delay,
        }
    }

    /// Wires the production annotators around one shared LLM client.
    pub fn with_llm(store: Arc<dyn CatalogStore>, llm: LlmClient, call_delay: Duration) -> Self {
        Self::new(
            store,
            Arc::new(LlmSummarizer::new(llm.clone())),
            Arc::new(LlmTagger::new(llm)),
            call_delay,
        )
    }

    /// Annotates up to `max_candidates` postings that miss the attribute
    /// `kind` names. Safe to re-invoke at any time: already-annotated
    /// postings are never selected, so repeated runs converge to no-ops.
    pub async fn run(
        &self,
        kind: BackfillKind,
        max_candidates: usize,
    ) -> Result<BackfillRun, PipelineError> {
        let candidates = match kind {
            BackfillKind::Summary => self.store.select_missing_summary(max_candidates).await?,
            BackfillKind::Disciplines => {
                self.store.select_missing_disciplines(max_candidates).await?
            }
        };

        let total = candidates.len();
        let mut succeeded = 0;

        info!("Backfill ({kind}) starting: {total} candidates");

        for row in &candidates {
            match self.annotate(kind, row).await {
                Ok(()) => succeeded += 1,
                Err(e) => warn!("Backfill ({kind}) skipping posting {}: {e}", row.id),
            }
            // Pace every call, success or failure; the provider meters
            // requests, not outcomes.
            tokio::time::sleep(self.call_delay).await;
        }

        let run = BackfillRun {
            kind,
            total,
            succeeded,
        };
        info!(
            "Backfill ({kind}) finished: {} of {} succeeded, {} failed",
            run.succeeded,
            run.total,
            run.failed()
        );
        Ok(run)
    }

    async fn annotate(&self, kind: BackfillKind, row: &OpportunityRow) -> Result<(), PipelineError> {
        let posting = PostingText::from(row);
        match kind {
            BackfillKind::Summary => {
                let summary = self.summarizer.summarize(&posting).await?;
                self.store.store_summary(row.id, &summary).await
            }
            BackfillKind::Disciplines => {
                let tags = self.tagger.tag(&posting).await?;
                self.store.store_disciplines(row.id, &tags).await
            }
        }
    }
}
