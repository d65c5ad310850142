//! Ingestion state machine.
//!
//! Handles one work unit per call: guards against stale and stopped runs,
//! runs the catalog page through its adapter, records progress on the run
//! record and enqueues the single successor unit. A run walks
//! `tires → wheels` for collect and update passes; an update pass is followed
//! by a `tires → wheels` delete pass before the run finishes.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::catalog::{CatalogRegistry, PageOutcome};
use crate::models::{Action, Catalog, RunRecord, RunStatus, WorkUnit};
use crate::repositories::{QueueError, RunStateStore, StoreError, WorkQueue};

/// Infrastructure failures. The message should be redelivered.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Payload is not a work unit.
    Malformed,
    /// Unit belongs to a run other than the current one.
    StaleRun,
    /// Current run was stopped.
    Stopped,
    /// Update or delete unit without a watermark.
    MissingWatermark,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Page processed and the successor unit enqueued.
    Enqueued(WorkUnit),
    /// Last page of the run processed; watermark recorded.
    Finished,
    /// Page failed; run marked Failed.
    Failed,
    /// Page processed but the run was stopped or replaced meanwhile.
    Halted,
    Dropped(DropReason),
}

/// What follows a successfully processed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Enqueue(WorkUnit),
    Finish,
}

/// Successor of `unit` given the page's `has_next_page` flag.
pub fn next_step(unit: &WorkUnit, has_next_page: bool, page_size: u64) -> NextStep {
    if has_next_page {
        return NextStep::Enqueue(WorkUnit {
            offset: unit.offset + page_size,
            ..unit.clone()
        });
    }

    match (unit.catalog.next(), unit.action) {
        (Some(catalog), _) => NextStep::Enqueue(WorkUnit {
            catalog,
            offset: 0,
            ..unit.clone()
        }),
        (None, Action::Update) => NextStep::Enqueue(WorkUnit {
            catalog: Catalog::Tires,
            action: Action::Delete,
            offset: 0,
            ..unit.clone()
        }),
        (None, Action::Collect | Action::Delete) => NextStep::Finish,
    }
}

pub struct IngestionStateMachine {
    catalogs: CatalogRegistry,
    run_state: Arc<dyn RunStateStore>,
    queue: Arc<dyn WorkQueue>,
    page_size: u64,
}

impl IngestionStateMachine {
    pub fn new(
        catalogs: CatalogRegistry,
        run_state: Arc<dyn RunStateStore>,
        queue: Arc<dyn WorkQueue>,
        page_size: u64,
    ) -> Self {
        Self {
            catalogs,
            run_state,
            queue,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Parses `payload` and handles it. Malformed payloads are dropped.
    pub async fn handle_raw(&self, payload: &str) -> Result<HandleOutcome, IngestError> {
        match WorkUnit::from_json(payload) {
            Ok(unit) => self.handle(unit).await,
            Err(err) => {
                warn!(error = %err, "Dropping malformed work unit");
                Ok(HandleOutcome::Dropped(DropReason::Malformed))
            }
        }
    }

    #[instrument(
        skip_all,
        fields(run_id = unit.run_id, catalog = %unit.catalog, action = %unit.action, offset = unit.offset)
    )]
    pub async fn handle(&self, unit: WorkUnit) -> Result<HandleOutcome, IngestError> {
        let Some(record) = self.run_state.load_run().await? else {
            debug!("No run record; dropping work unit");
            return Ok(HandleOutcome::Dropped(DropReason::StaleRun));
        };
        if record.run_id != unit.run_id {
            debug!(current_run_id = record.run_id, "Dropping work unit from another run");
            return Ok(HandleOutcome::Dropped(DropReason::StaleRun));
        }
        if record.status == RunStatus::Stopped {
            info!("Run stopped; dropping work unit");
            return Ok(HandleOutcome::Dropped(DropReason::Stopped));
        }

        let watermark = unit.watermark().unwrap_or_default();
        if unit.action.requires_watermark() && watermark.is_empty() {
            warn!("Work unit has no watermark; dropping");
            return Ok(HandleOutcome::Dropped(DropReason::MissingWatermark));
        }

        let adapter = match self.catalogs.get(unit.catalog) {
            Ok(adapter) => adapter,
            Err(err) => {
                error!(error = %err, "Cannot process work unit");
                return self.mark_failed(unit.run_id).await;
            }
        };

        let started = Instant::now();
        if unit.offset == 0 {
            match unit.action {
                Action::Collect => {
                    adapter.reconcile_rebates(false).await;
                }
                Action::Update => {
                    adapter.reconcile_rebates(true).await;
                }
                Action::Delete => {}
            }
        }

        let result = match unit.action {
            Action::Collect => adapter.collect(unit.offset, self.page_size).await,
            Action::Update => adapter.update(unit.offset, self.page_size, watermark).await,
            Action::Delete => adapter.delete(unit.offset, self.page_size, watermark).await,
        };

        let page = match result {
            Ok(page) => page,
            Err(err) => {
                error!(error = %err, "Page failed; marking run as failed");
                return self.mark_failed(unit.run_id).await;
            }
        };

        if page.degraded {
            warn!("Page fetch exhausted retries; continuing as if the catalog ended here");
        }
        counter!(
            "catalog_pages_processed_total",
            "catalog" => unit.catalog.as_str(),
            "action" => unit.action.as_str()
        )
        .increment(1);
        histogram!("catalog_page_duration_ms").record(started.elapsed().as_secs_f64() * 1_000.0);

        let Some(record) = self.record_progress(&unit, &page).await? else {
            info!("Run replaced while the page was processed");
            return Ok(HandleOutcome::Halted);
        };
        if record.status == RunStatus::Stopped {
            info!("Run stopped while the page was processed");
            return Ok(HandleOutcome::Halted);
        }

        match next_step(&unit, page.has_next_page, self.page_size) {
            NextStep::Enqueue(next) => {
                self.queue.send(&next).await?;
                debug!(
                    next_catalog = %next.catalog,
                    next_action = %next.action,
                    next_offset = next.offset,
                    "Enqueued next work unit"
                );
                Ok(HandleOutcome::Enqueued(next))
            }
            NextStep::Finish => self.finish(&unit).await,
        }
    }

    /// Run record for `run_id`, or `None` if another run has replaced it.
    async fn current_run(&self, run_id: i64) -> Result<Option<RunRecord>, StoreError> {
        let record = self.run_state.load_run().await?;
        Ok(record.filter(|record| record.run_id == run_id))
    }

    async fn record_progress(
        &self,
        unit: &WorkUnit,
        page: &PageOutcome,
    ) -> Result<Option<RunRecord>, IngestError> {
        let Some(mut record) = self.current_run(unit.run_id).await? else {
            return Ok(None);
        };

        match unit.action {
            Action::Collect => {
                record.record_progress(unit.catalog, unit.offset + page.items, page.total_count);
                record.advance_status(RunStatus::Collecting);
            }
            Action::Update => {
                record.record_progress(unit.catalog, unit.offset + page.items, page.total_count);
                record.advance_status(RunStatus::Updating);
            }
            // Delete pages leave the counters alone.
            Action::Delete => record.advance_status(RunStatus::Updating),
        }
        record.updated_at = Some(Utc::now());

        self.run_state.save_run(&record).await?;
        Ok(Some(record))
    }

    async fn finish(&self, unit: &WorkUnit) -> Result<HandleOutcome, IngestError> {
        let Some(mut record) = self.current_run(unit.run_id).await? else {
            return Ok(HandleOutcome::Halted);
        };

        let now = Utc::now();
        let watermark = record.finish_watermark(now);
        self.run_state.save_watermark(&watermark).await?;

        record.advance_status(RunStatus::Finished);
        record.updated_at = Some(now);
        self.run_state.save_run(&record).await?;

        counter!("catalog_runs_finished_total", "action" => unit.action.as_str()).increment(1);
        info!(
            watermark = %watermark,
            tires_processed = record.tires_processed,
            wheels_processed = record.wheels_processed,
            "Run finished"
        );
        Ok(HandleOutcome::Finished)
    }

    async fn mark_failed(&self, run_id: i64) -> Result<HandleOutcome, IngestError> {
        let Some(mut record) = self.current_run(run_id).await? else {
            return Ok(HandleOutcome::Halted);
        };

        record.status = RunStatus::Failed;
        record.updated_at = Some(Utc::now());
        self.run_state.save_run(&record).await?;
        Ok(HandleOutcome::Failed)
    }
}
