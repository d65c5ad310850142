//! Rebate set reconciliation.
//!
//! Each catalog's rebates arrive as one unpaginated list. Reconciling upserts
//! that list and, in check-deleted mode, removes stored rebates the upstream
//! no longer returns. Nothing here fails a run: fetch and write problems are
//! logged and reflected in the returned summary.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::bulk::{BulkWriter, TableKind};
use crate::catalog::{CatalogApiClient, FetchError};
use crate::models::{Catalog, Rebate};

/// Where the current rebate set comes from.
#[async_trait]
pub trait RebateSource: Send + Sync {
    async fn fetch_rebates(&self, catalog: Catalog) -> Result<Vec<Rebate>, FetchError>;
}

#[async_trait]
impl RebateSource for CatalogApiClient {
    async fn fetch_rebates(&self, catalog: Catalog) -> Result<Vec<Rebate>, FetchError> {
        CatalogApiClient::fetch_rebates(self, catalog).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub fetched: usize,
    pub upserted: usize,
    pub deleted: usize,
    pub fetch_failed: bool,
    pub failed_chunks: usize,
}

#[derive(Clone)]
pub struct RebateReconciler {
    source: Arc<dyn RebateSource>,
    writer: BulkWriter,
}

impl RebateReconciler {
    pub fn new(source: Arc<dyn RebateSource>, writer: BulkWriter) -> Self {
        Self { source, writer }
    }

    #[instrument(skip(self))]
    pub async fn reconcile(&self, catalog: Catalog, check_deleted: bool) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();

        let rebates = match self.source.fetch_rebates(catalog).await {
            Ok(rebates) => rebates,
            Err(err) => {
                warn!(catalog = %catalog, error = %err, "Rebate fetch failed; continuing with no rebates");
                summary.fetch_failed = true;
                Vec::new()
            }
        };
        summary.fetched = rebates.len();

        // A failed fetch counts as an empty rebate set, so every stored rebate is stale.
        if check_deleted {
            self.delete_stale(catalog, &rebates, &mut summary).await;
        }

        if !rebates.is_empty() {
            let report = self.writer.bulk_write(catalog, &rebates).await;
            summary.failed_chunks += report.failures.len();
            if report.is_success() {
                summary.upserted = report.records;
            }
        }

        info!(
            catalog = %catalog,
            fetched = summary.fetched,
            upserted = summary.upserted,
            deleted = summary.deleted,
            failed_chunks = summary.failed_chunks,
            "Rebates reconciled"
        );
        summary
    }

    async fn delete_stale(&self, catalog: Catalog, fetched: &[Rebate], summary: &mut ReconcileSummary) {
        let stored = match self.writer.stored_ids(catalog, TableKind::Rebates).await {
            Ok(stored) => stored,
            Err(err) => {
                warn!(catalog = %catalog, error = %err, "Could not read stored rebate ids");
                return;
            }
        };

        let stale = stale_rebate_ids(&stored, fetched);
        if stale.is_empty() {
            return;
        }

        let report = self
            .writer
            .delete_by_ids(catalog, TableKind::Rebates, &stale)
            .await;
        summary.failed_chunks += report.failures.len();
        if report.is_success() {
            summary.deleted = stale.len();
        }
    }
}

/// Stored ids that are absent from the fetched set, in stored order.
pub fn stale_rebate_ids(stored: &[String], fetched: &[Rebate]) -> Vec<String> {
    let current: HashSet<&str> = fetched.iter().map(|rebate| rebate.id.as_str()).collect();
    stored
        .iter()
        .filter(|id| !current.contains(id.as_str()))
        .cloned()
        .collect()
}
