//! Run controller: starts collection and update runs and stops them.
//!
//! Starting reads the run record and then writes the new one; there is no
//! compare-and-swap, so two concurrent start requests can both succeed. The
//! later record wins and the earlier run's work units are dropped as stale.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::models::{Action, Catalog, RunRecord, RunStatus, WorkUnit};
use crate::repositories::{QueueError, RunStateStore, StoreError, WorkQueue};

#[derive(Debug, Error)]
pub enum RunControlError {
    #[error("A run is already in progress (status {})", status.as_str())]
    AlreadyRunning { status: RunStatus },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Current run record plus the last successful watermark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub run: Option<RunRecord>,
    pub last_watermark: Option<String>,
}

pub struct RunController {
    run_state: Arc<dyn RunStateStore>,
    queue: Arc<dyn WorkQueue>,
    last_run_id: AtomicI64,
}

impl RunController {
    pub fn new(run_state: Arc<dyn RunStateStore>, queue: Arc<dyn WorkQueue>) -> Self {
        Self {
            run_state,
            queue,
            last_run_id: AtomicI64::new(0),
        }
    }

    /// Starts a full collection of both catalogs.
    #[instrument(skip(self))]
    pub async fn start_collecting(&self) -> Result<RunRecord, RunControlError> {
        self.start(RunStatus::Collecting).await
    }

    /// Starts an incremental update from the last successful watermark.
    #[instrument(skip(self))]
    pub async fn start_updating(&self) -> Result<RunRecord, RunControlError> {
        self.start(RunStatus::Updating).await
    }

    /// Marks the current run Stopped. Queued units are dropped on delivery.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<RunRecord, RunControlError> {
        let now = Utc::now();
        let mut record = match self.run_state.load_run().await? {
            Some(record) => record,
            None => RunRecord {
                started_at: None,
                ..RunRecord::start(0, RunStatus::Idle, now)
            },
        };

        record.status = RunStatus::Stopped;
        record.updated_at = Some(now);
        self.run_state.save_run(&record).await?;

        info!(run_id = record.run_id, "Run stopped");
        Ok(record)
    }

    pub async fn state(&self) -> Result<RunSnapshot, RunControlError> {
        Ok(RunSnapshot {
            run: self.run_state.load_run().await?,
            last_watermark: self.run_state.last_watermark().await?,
        })
    }

    async fn start(&self, status: RunStatus) -> Result<RunRecord, RunControlError> {
        let current = self.run_state.load_run().await?;
        if let Some(current) = &current {
            if current.status.is_running() {
                warn!(run_id = current.run_id, status = current.status.as_str(), "Refusing to start a second run");
                return Err(RunControlError::AlreadyRunning {
                    status: current.status,
                });
            }
        }

        let floor = current.as_ref().map_or(0, |record| record.run_id);
        let run_id = self.next_run_id(floor);

        let first = if status == RunStatus::Updating {
            let watermark = self.run_state.last_watermark().await?.unwrap_or_default();
            if watermark.is_empty() {
                warn!(run_id, "No previous watermark; the update pass will be dropped");
            }
            WorkUnit::with_watermark(Catalog::Tires, Action::Update, 0, watermark, run_id)
        } else {
            WorkUnit::collect(Catalog::Tires, 0, run_id)
        };

        let record = RunRecord::start(run_id, status, Utc::now());
        self.run_state.save_run(&record).await?;
        self.queue.send(&first).await?;

        info!(run_id, status = status.as_str(), "Run started");
        Ok(record)
    }

    /// Wall-clock milliseconds, bumped so ids strictly increase within this
    /// process and exceed `floor`.
    fn next_run_id(&self, floor: i64) -> i64 {
        let now = Utc::now().timestamp_millis();
        let bump = |prev: i64| now.max(prev + 1).max(floor + 1);
        let prev = match self
            .last_run_id
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| Some(bump(prev)))
        {
            Ok(prev) | Err(prev) => prev,
        };
        bump(prev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{InMemoryRunStateStore, InMemoryWorkQueue};

    fn controller() -> (RunController, Arc<InMemoryRunStateStore>, Arc<InMemoryWorkQueue>) {
        let store = Arc::new(InMemoryRunStateStore::new());
        let queue = Arc::new(InMemoryWorkQueue::new());
        (RunController::new(store.clone(), queue.clone()), store, queue)
    }

    #[test]
    fn run_ids_strictly_increase() {
        let (controller, _, _) = controller();
        let first = controller.next_run_id(0);
        let second = controller.next_run_id(0);
        assert!(second > first);
        assert!(controller.next_run_id(i64::MAX / 2) > i64::MAX / 2);
    }

    #[tokio::test]
    async fn start_collecting_enqueues_first_tire_page() {
        let (controller, store, queue) = controller();

        let record = controller.start_collecting().await.unwrap();

        assert_eq!(record.status, RunStatus::Collecting);
        assert_eq!(store.load_run().await.unwrap(), Some(record.clone()));
        assert_eq!(
            queue.pending_units().await,
            vec![WorkUnit::collect(Catalog::Tires, 0, record.run_id)]
        );
    }

    #[tokio::test]
    async fn second_start_is_refused_without_mutation() {
        let (controller, store, queue) = controller();
        let record = controller.start_collecting().await.unwrap();

        let err = controller.start_updating().await.unwrap_err();

        assert!(matches!(
            err,
            RunControlError::AlreadyRunning {
                status: RunStatus::Collecting
            }
        ));
        assert_eq!(store.load_run().await.unwrap(), Some(record));
        assert_eq!(queue.len().await, 1);
    }

    #[tokio::test]
    async fn update_starts_from_last_watermark() {
        let (controller, store, queue) = controller();
        store.save_watermark("2025-02-20T10:00:00.000Z").await.unwrap();

        let record = controller.start_updating().await.unwrap();

        let units = queue.pending_units().await;
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].action, Action::Update);
        assert_eq!(units[0].watermark(), Some("2025-02-20T10:00:00.000Z"));
        assert_eq!(units[0].run_id, record.run_id);
    }

    #[tokio::test]
    async fn stop_allows_a_new_run() {
        let (controller, _, _) = controller();
        let first = controller.start_collecting().await.unwrap();

        let stopped = controller.stop().await.unwrap();
        assert_eq!(stopped.status, RunStatus::Stopped);
        assert_eq!(stopped.run_id, first.run_id);

        let second = controller.start_collecting().await.unwrap();
        assert!(second.run_id > first.run_id);
    }

    #[tokio::test]
    async fn stop_without_a_run_records_stopped() {
        let (controller, _, _) = controller();
        let snapshot = controller.state().await.unwrap();
        assert!(snapshot.run.is_none());

        controller.stop().await.unwrap();

        let snapshot = controller.state().await.unwrap();
        assert_eq!(snapshot.run.unwrap().status, RunStatus::Stopped);
    }
}
