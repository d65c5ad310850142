//! Catalog registry
//!
//! Maps each [`Catalog`] to the adapter that ingests it.

use std::collections::HashMap;
use std::sync::Arc;

use super::{CatalogAdapter, CatalogApiClient, TiresAdapter, WheelsAdapter};
use crate::bulk::BulkWriter;
use crate::models::Catalog;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("No adapter registered for catalog '{catalog}'")]
    CatalogNotRegistered { catalog: Catalog },
}

#[derive(Clone, Default)]
pub struct CatalogRegistry {
    adapters: HashMap<Catalog, Arc<dyn CatalogAdapter>>,
}

impl CatalogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the API-backed tire and wheel adapters.
    pub fn with_api(client: Arc<CatalogApiClient>, writer: BulkWriter) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TiresAdapter::new(client.clone(), writer.clone())));
        registry.register(Arc::new(WheelsAdapter::new(client, writer)));
        registry
    }

    /// Adds `adapter` under its own catalog, replacing any previous one.
    pub fn register(&mut self, adapter: Arc<dyn CatalogAdapter>) {
        self.adapters.insert(adapter.catalog(), adapter);
    }

    pub fn get(&self, catalog: Catalog) -> Result<Arc<dyn CatalogAdapter>, RegistryError> {
        self.adapters
            .get(&catalog)
            .cloned()
            .ok_or(RegistryError::CatalogNotRegistered { catalog })
    }

    pub fn catalogs(&self) -> Vec<Catalog> {
        Catalog::ALL
            .into_iter()
            .filter(|catalog| self.adapters.contains_key(catalog))
            .collect()
    }
}
