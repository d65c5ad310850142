//! Per-catalog page ingestion.

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::{CatalogApiClient, FetchError, Page, PageRequest};
use crate::bulk::{BulkWriteError, BulkWriter, TableKind};
use crate::models::{
    BrandRecord, Catalog, CatalogProduct, DeletedItem, ModelRecord, Rebate, TireProduct, WheelProduct,
};
use crate::rebates::{RebateReconciler, RebateSource, ReconcileSummary};

/// Result of processing one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOutcome {
    /// Number of items the page carried.
    pub items: u64,
    pub total_count: u64,
    pub has_next_page: bool,
    /// The page is empty because every fetch attempt failed.
    pub degraded: bool,
}

impl PageOutcome {
    fn of<T>(page: &Page<T>) -> Self {
        Self {
            items: page.items.len() as u64,
            total_count: page.total_count,
            has_next_page: page.has_next_page,
            degraded: page.degraded,
        }
    }
}

#[derive(Debug, Error)]
pub enum PageError {
    #[error("product write failed: {0}")]
    ProductWrite(#[from] BulkWriteError),
}

/// Fetch-and-write operations for one catalog.
#[async_trait]
pub trait CatalogAdapter: Send + Sync {
    fn catalog(&self) -> Catalog;

    /// Full-collection page.
    async fn collect(&self, offset: u64, limit: u64) -> Result<PageOutcome, PageError>;

    /// Page of items changed after `watermark`.
    async fn update(&self, offset: u64, limit: u64, watermark: &str) -> Result<PageOutcome, PageError>;

    /// Page of items removed after `watermark`; their product rows are deleted.
    async fn delete(&self, offset: u64, limit: u64, watermark: &str) -> Result<PageOutcome, PageError>;

    async fn fetch_rebates(&self) -> Result<Vec<Rebate>, FetchError>;

    async fn reconcile_rebates(&self, check_deleted: bool) -> ReconcileSummary;
}

/// [`CatalogAdapter`] backed by the catalog API and the bulk writer.
pub struct ProductCatalog<P> {
    client: Arc<CatalogApiClient>,
    writer: BulkWriter,
    reconciler: RebateReconciler,
    _product: PhantomData<fn() -> P>,
}

pub type TiresAdapter = ProductCatalog<TireProduct>;
pub type WheelsAdapter = ProductCatalog<WheelProduct>;

impl<P: CatalogProduct> ProductCatalog<P> {
    pub fn new(client: Arc<CatalogApiClient>, writer: BulkWriter) -> Self {
        let source: Arc<dyn RebateSource> = client.clone();
        let reconciler = RebateReconciler::new(source, writer.clone());
        Self {
            client,
            writer,
            reconciler,
            _product: PhantomData,
        }
    }

    async fn ingest(&self, request: PageRequest) -> Result<PageOutcome, PageError> {
        let page: Page<P> = self
            .client
            .fetch_page(P::OPERATION, P::COLLECTION, P::SELECTION, &request)
            .await;

        let (brands, models) = page_references(&page.items);
        let report = self.writer.bulk_write(P::CATALOG, &brands).await;
        if !report.is_success() {
            warn!(catalog = %P::CATALOG, failed = report.failures.len(), "Brand write had failed chunks");
        }
        let report = self.writer.bulk_write(P::CATALOG, &models).await;
        if !report.is_success() {
            warn!(catalog = %P::CATALOG, failed = report.failures.len(), "Model write had failed chunks");
        }

        self.writer
            .bulk_write(P::CATALOG, &page.items)
            .await
            .into_result()?;

        debug!(
            catalog = %P::CATALOG,
            offset = request.offset,
            items = page.items.len(),
            brands = brands.len(),
            models = models.len(),
            "Page written"
        );
        Ok(PageOutcome::of(&page))
    }
}

#[async_trait]
impl<P: CatalogProduct> CatalogAdapter for ProductCatalog<P> {
    fn catalog(&self) -> Catalog {
        P::CATALOG
    }

    #[instrument(skip(self), fields(catalog = %P::CATALOG))]
    async fn collect(&self, offset: u64, limit: u64) -> Result<PageOutcome, PageError> {
        self.ingest(PageRequest::new(offset, limit)).await
    }

    #[instrument(skip(self), fields(catalog = %P::CATALOG))]
    async fn update(&self, offset: u64, limit: u64, watermark: &str) -> Result<PageOutcome, PageError> {
        self.ingest(PageRequest::updated_after(offset, limit, watermark))
            .await
    }

    #[instrument(skip(self), fields(catalog = %P::CATALOG))]
    async fn delete(&self, offset: u64, limit: u64, watermark: &str) -> Result<PageOutcome, PageError> {
        let request = PageRequest::deleted_after(offset, limit, watermark);
        let page: Page<DeletedItem> = self
            .client
            .fetch_page(P::OPERATION, P::COLLECTION, "id", &request)
            .await;

        let ids: Vec<String> = page.items.iter().map(|item| item.id.clone()).collect();
        if !ids.is_empty() {
            let report = self
                .writer
                .delete_by_ids(P::CATALOG, TableKind::Products, &ids)
                .await;
            if !report.is_success() {
                warn!(
                    catalog = %P::CATALOG,
                    failed = report.failures.len(),
                    "Product delete had failed chunks"
                );
            }
        }

        Ok(PageOutcome::of(&page))
    }

    async fn fetch_rebates(&self) -> Result<Vec<Rebate>, FetchError> {
        self.client.fetch_rebates(P::CATALOG).await
    }

    async fn reconcile_rebates(&self, check_deleted: bool) -> ReconcileSummary {
        self.reconciler.reconcile(P::CATALOG, check_deleted).await
    }
}

/// Distinct brands and models referenced by a page.
///
/// Models are keyed by name; when a name repeats, the last item wins.
pub fn page_references<P: CatalogProduct>(items: &[P]) -> (Vec<BrandRecord>, Vec<ModelRecord>) {
    let mut brands = BTreeSet::new();
    let mut models = BTreeMap::new();

    for item in items {
        if let Some(brand) = item.brand_name() {
            brands.insert(brand.to_string());
        }
        if let Some(model) = item.model_name() {
            models.insert(
                model.to_string(),
                ModelRecord {
                    name: model.to_string(),
                    brand_name: item.brand_name().map(str::to_string),
                    taxonomy_id: None,
                },
            );
        }
    }

    (
        brands.into_iter().map(|name| BrandRecord { name }).collect(),
        models.into_values().collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tire(id: u32, brand: Option<&str>, model: Option<&str>) -> TireProduct {
        serde_json::from_value(json!({
            "id": id,
            "brand": brand,
            "modelName": model,
        }))
        .unwrap()
    }

    #[test]
    fn references_are_distinct_and_sorted() {
        let items = vec![
            tire(1, Some("Michelin"), Some("Defender")),
            tire(2, Some("Advanta"), Some("AT")),
            tire(3, Some("Michelin"), Some("Pilot")),
        ];

        let (brands, models) = page_references(&items);

        let brand_names: Vec<_> = brands.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(brand_names, vec!["Advanta", "Michelin"]);
        let model_names: Vec<_> = models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(model_names, vec!["AT", "Defender", "Pilot"]);
        assert!(models.iter().all(|m| m.taxonomy_id.is_none()));
    }

    #[test]
    fn repeated_model_takes_last_brand() {
        let items = vec![
            tire(1, Some("Old"), Some("Shared")),
            tire(2, Some("New"), Some("Shared")),
        ];

        let (_, models) = page_references(&items);

        assert_eq!(models.len(), 1);
        assert_eq!(models[0].brand_name.as_deref(), Some("New"));
    }

    #[test]
    fn items_without_names_add_no_references() {
        let (brands, models) = page_references(&[tire(9, None, None)]);
        assert!(brands.is_empty());
        assert!(models.is_empty());
    }
}
