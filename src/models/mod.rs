//! # Data Models
//!
//! Work units, run records, catalog records and the SeaORM entities backing
//! the key-value store and work queue.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod catalog;
pub(crate) mod ids;
pub mod kv_entry;
pub mod product;
pub mod queue_message;
pub mod rebate;
pub mod run_record;
pub mod work_unit;

pub use catalog::{Action, Catalog};
pub use kv_entry::Entity as KvEntry;
pub use product::{BrandRecord, CatalogProduct, DeletedItem, ModelRecord, TireProduct, WheelProduct};
pub use queue_message::Entity as QueueMessage;
pub use rebate::Rebate;
pub use run_record::{RunRecord, RunStatus};
pub use work_unit::WorkUnit;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "catalog-sync".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
