//! Catalog persistence: candidate selection for the backfill and
//! persistence of finished annotations, behind a trait so the pipeline
//! stays neutral about the engine. `PgCatalogStore` is the production
//! implementation; `memory::MemoryCatalog` backs tests and lightweight
//! embedding.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::annotate::disciplines::DisciplineTagSet;
use crate::annotate::summarize::OpportunitySummary;
use crate::errors::PipelineError;
use crate::models::opportunity::{CatalogItem, OpportunityRow, STATUS_RECRUITING};

pub mod memory;

/// The catalog operations the pipeline needs. Selection predicates carry
/// the idempotence contract: a posting whose attribute is already set is
/// never selected again, so persists can stay unconditional.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Recruiting postings that still lack a summary, newest first.
    async fn select_missing_summary(
        &self,
        limit: usize,
    ) -> Result<Vec<OpportunityRow>, PipelineError>;

    /// Recruiting postings that still lack discipline tags, newest first.
    /// A posting tagged with an empty set does not count as lacking tags.
    async fn select_missing_disciplines(
        &self,
        limit: usize,
    ) -> Result<Vec<OpportunityRow>, PipelineError>;

    /// Persists a posting's summary. Fails when the posting no longer
    /// exists.
    async fn store_summary(
        &self,
        id: Uuid,
        summary: &OpportunitySummary,
    ) -> Result<(), PipelineError>;

    /// Persists a posting's tags. An empty set is stored as an empty
    /// array, never NULL. Fails when the posting no longer exists.
    async fn store_disciplines(
        &self,
        id: Uuid,
        tags: &DisciplineTagSet,
    ) -> Result<(), PipelineError>;

    /// Recruiting postings that already have a summary, newest first:
    /// the matching engine's feed.
    async fn summarized_items(&self) -> Result<Vec<CatalogItem>, PipelineError>;
}

/// PostgreSQL-backed catalog store.
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool against `database_url` and wraps it.
    pub async fn connect(database_url: &str) -> Result<Self, PipelineError> {
        info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn select_missing_summary(
        &self,
        limit: usize,
    ) -> Result<Vec<OpportunityRow>, PipelineError> {
        Ok(sqlx::query_as::<_, OpportunityRow>(
            r#"
            SELECT * FROM opportunities
            WHERE status = $1 AND summary IS NULL
            ORDER BY posted_at DESC, id
            LIMIT $2
            "#,
        )
        .bind(STATUS_RECRUITING)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn select_missing_disciplines(
        &self,
        limit: usize,
    ) -> Result<Vec<OpportunityRow>, PipelineError> {
        Ok(sqlx::query_as::<_, OpportunityRow>(
            r#"
            SELECT * FROM opportunities
            WHERE status = $1 AND disciplines IS NULL
            ORDER BY posted_at DESC, id
            LIMIT $2
            "#,
        )
        .bind(STATUS_RECRUITING)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn store_summary(
        &self,
        id: Uuid,
        summary: &OpportunitySummary,
    ) -> Result<(), PipelineError> {
        let value = serde_json::to_value(summary).map_err(anyhow::Error::from)?;
        let result = sqlx::query("UPDATE opportunities SET summary = $1 WHERE id = $2")
            .bind(value)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PipelineError::Store(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    async fn store_disciplines(
        &self,
        id: Uuid,
        tags: &DisciplineTagSet,
    ) -> Result<(), PipelineError> {
        let result = sqlx::query("UPDATE opportunities SET disciplines = $1 WHERE id = $2")
            .bind(tags.as_slice())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PipelineError::Store(sqlx::Error::RowNotFound));
        }
        Ok(())
    }

    async fn summarized_items(&self) -> Result<Vec<CatalogItem>, PipelineError> {
        let rows = sqlx::query_as::<_, OpportunityRow>(
            r#"
            SELECT * FROM opportunities
            WHERE status = $1 AND summary IS NOT NULL
            ORDER BY posted_at DESC, id
            "#,
        )
        .bind(STATUS_RECRUITING)
        .fetch_all(&self.pool)
        .await?;

        Ok(items_from_rows(rows))
    }
}

/// Converts stored rows into matching-engine items. Rows whose summary
/// JSONB no longer validates are skipped with a warning rather than
/// failing the whole feed.
pub(crate) fn items_from_rows(rows: Vec<OpportunityRow>) -> Vec<CatalogItem> {
    rows.into_iter()
        .filter_map(|row| {
            let raw = row.summary?;
            match OpportunitySummary::from_value(&raw) {
                Ok(summary) => Some(CatalogItem {
                    id: row.id,
                    posted_at: row.posted_at,
                    summary,
                }),
                Err(e) => {
                    warn!("Skipping posting {}: stored summary no longer validates: {e}", row.id);
                    None
                }
            }
        })
        .collect()
}
