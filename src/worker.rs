//! Queue worker: delivers queued work units to the state machine one at a
//! time until shut down.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::ingestion::{HandleOutcome, IngestError, IngestionStateMachine};
use crate::repositories::WorkQueue;
use crate::telemetry::{TraceContext, with_trace_context};

pub struct QueueWorker {
    queue: Arc<dyn WorkQueue>,
    machine: Arc<IngestionStateMachine>,
    tick: Duration,
}

impl QueueWorker {
    pub fn new(queue: Arc<dyn WorkQueue>, machine: Arc<IngestionStateMachine>, tick: Duration) -> Self {
        Self {
            queue,
            machine,
            tick,
        }
    }

    /// Poll the queue until `shutdown` fires. Sleeps one tick whenever the
    /// queue is empty or a delivery could not be completed.
    #[instrument(skip_all)]
    pub async fn run(self, shutdown: CancellationToken) {
        info!(tick_ms = self.tick.as_millis() as u64, "Starting queue worker");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let busy = match self.process_next().await {
                Ok(Some(_)) => true,
                Ok(None) => false,
                Err(err) => {
                    error!(error = %err, "Work unit left unacknowledged");
                    false
                }
            };
            if busy {
                continue;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(self.tick) => {}
            }
        }

        info!("Queue worker stopped");
    }

    /// Receives and handles one message. The message is acked unless the
    /// state machine reported an infrastructure error, in which case it is
    /// redelivered after the queue's visibility timeout.
    pub async fn process_next(&self) -> Result<Option<HandleOutcome>, IngestError> {
        let Some(delivery) = self.queue.receive().await? else {
            return Ok(None);
        };

        if delivery.attempts > 1 {
            warn!(message_id = %delivery.id, attempts = delivery.attempts, "Redelivered work unit");
        }

        let context = TraceContext::for_delivery(delivery.id);
        let span = context.delivery_span(delivery.attempts);
        let outcome = with_trace_context(context, self.machine.handle_raw(&delivery.body))
            .instrument(span)
            .await?;
        self.queue.ack(&delivery).await?;
        debug!(message_id = %delivery.id, outcome = ?outcome, "Work unit handled");
        Ok(Some(outcome))
    }

    /// Handles messages until the queue is empty or `limit` were processed.
    pub async fn drain(&self, limit: usize) -> Result<Vec<HandleOutcome>, IngestError> {
        let mut outcomes = Vec::new();
        while outcomes.len() < limit {
            match self.process_next().await? {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }
        Ok(outcomes)
    }
}
