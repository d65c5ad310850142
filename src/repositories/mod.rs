//! # Store Adapters
//!
//! Persistence seams for the ingestion pipeline: the run state store and the
//! work queue, each with a SeaORM implementation and an in-memory one.

pub mod run_state;
pub mod work_queue;

pub use run_state::{
    InMemoryRunStateStore, RUN_STATE_KEY, RunStateStore, SeaOrmRunStateStore, StoreError, WATERMARK_KEY,
};
pub use work_queue::{Delivery, DbWorkQueue, InMemoryWorkQueue, QueueError, WorkQueue};
