//! Wiring of the ingestion components over one database connection.

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;

use crate::bulk::BulkWriter;
use crate::catalog::{CatalogApiClient, CatalogRegistry, FetchError};
use crate::config::AppConfig;
use crate::ingestion::IngestionStateMachine;
use crate::repositories::{DbWorkQueue, RunStateStore, SeaOrmRunStateStore, WorkQueue};
use crate::run_controller::RunController;
use crate::worker::QueueWorker;

#[derive(Clone)]
pub struct Pipeline {
    pub controller: Arc<RunController>,
    pub machine: Arc<IngestionStateMachine>,
    pub queue: Arc<dyn WorkQueue>,
}

impl Pipeline {
    pub fn new(
        catalogs: CatalogRegistry,
        run_state: Arc<dyn RunStateStore>,
        queue: Arc<dyn WorkQueue>,
        page_size: u64,
    ) -> Self {
        let controller = Arc::new(RunController::new(run_state.clone(), queue.clone()));
        let machine = Arc::new(IngestionStateMachine::new(
            catalogs,
            run_state,
            queue.clone(),
            page_size,
        ));
        Self {
            controller,
            machine,
            queue,
        }
    }

    /// API-backed adapters, `kv_entries` run state and the database queue.
    pub fn from_config(config: &AppConfig, db: DatabaseConnection) -> Result<Self, FetchError> {
        let client = Arc::new(CatalogApiClient::from_config(&config.catalog_api)?);
        let writer = BulkWriter::new(db.clone(), config.ingestion.max_bound_params);
        let catalogs = CatalogRegistry::with_api(client, writer);
        let run_state: Arc<dyn RunStateStore> = Arc::new(SeaOrmRunStateStore::new(db.clone()));
        let queue: Arc<dyn WorkQueue> =
            Arc::new(DbWorkQueue::new(db, config.worker.visibility_timeout()));

        Ok(Self::new(
            catalogs,
            run_state,
            queue,
            config.ingestion.page_size,
        ))
    }

    pub fn worker(&self, tick: Duration) -> QueueWorker {
        QueueWorker::new(self.queue.clone(), self.machine.clone(), tick)
    }
}
