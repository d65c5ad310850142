//! Database migrations for catalog-sync.
//!
//! Creates the per-catalog brand/model/rebate/product tables plus the
//! key-value and queue tables backing the run state store and work queue.

pub use sea_orm_migration::prelude::*;

mod m2025_02_20_000001_create_catalog_tables;
mod m2025_02_20_000002_create_kv_entries;
mod m2025_02_20_000003_create_queue_messages;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2025_02_20_000001_create_catalog_tables::Migration),
            Box::new(m2025_02_20_000002_create_kv_entries::Migration),
            Box::new(m2025_02_20_000003_create_queue_messages::Migration),
        ]
    }
}
