//! In-process catalog store. Backs the test suite and embedders that run
//! the pipeline without PostgreSQL; selection and persistence semantics
//! mirror `PgCatalogStore` exactly.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::annotate::disciplines::DisciplineTagSet;
use crate::annotate::summarize::OpportunitySummary;
use crate::errors::PipelineError;
use crate::models::opportunity::{CatalogItem, OpportunityRow, STATUS_RECRUITING};
use crate::store::{items_from_rows, CatalogStore};

#[derive(Default)]
pub struct MemoryCatalog {
    rows: Mutex<HashMap<Uuid, OpportunityRow>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a posting, replacing any existing row with the same id.
    pub async fn insert(&self, row: OpportunityRow) {
        self.rows.lock().await.insert(row.id, row);
    }

    pub async fn get(&self, id: Uuid) -> Option<OpportunityRow> {
        self.rows.lock().await.get(&id).cloned()
    }

    async fn select_missing<F>(&self, limit: usize, lacks: F) -> Vec<OpportunityRow>
    where
        F: Fn(&OpportunityRow) -> bool,
    {
        let rows = self.rows.lock().await;
        let mut selected: Vec<OpportunityRow> = rows
            .values()
            .filter(|r| r.status == STATUS_RECRUITING && lacks(r))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then_with(|| a.id.cmp(&b.id)));
        selected.truncate(limit);
        selected
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn select_missing_summary(
        &self,
        limit: usize,
    ) -> Result<Vec<OpportunityRow>, PipelineError> {
        Ok(self.select_missing(limit, |r| r.summary.is_none()).await)
    }

    async fn select_missing_disciplines(
        &self,
        limit: usize,
    ) -> Result<Vec<OpportunityRow>, PipelineError> {
        Ok(self.select_missing(limit, |r| r.disciplines.is_none()).await)
    }

    async fn store_summary(
        &self,
        id: Uuid,
        summary: &OpportunitySummary,
    ) -> Result<(), PipelineError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .get_mut(&id)
            .ok_or(PipelineError::Store(sqlx::Error::RowNotFound))?;
        row.summary = Some(serde_json::to_value(summary).map_err(anyhow::Error::from)?);
        Ok(())
    }

    async fn store_disciplines(
        &self,
        id: Uuid,
        tags: &DisciplineTagSet,
    ) -> Result<(), PipelineError> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .get_mut(&id)
            .ok_or(PipelineError::Store(sqlx::Error::RowNotFound))?;
        row.disciplines = Some(tags.as_slice().to_vec());
        Ok(())
    }

    async fn summarized_items(&self) -> Result<Vec<CatalogItem>, PipelineError> {
        let rows = self.rows.lock().await;
        let mut selected: Vec<OpportunityRow> = rows
            .values()
            .filter(|r| r.status == STATUS_RECRUITING && r.summary.is_some())
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.posted_at.cmp(&a.posted_at).then_with(|| a.id.cmp(&b.id)));
        Ok(items_from_rows(selected))
    }
}
