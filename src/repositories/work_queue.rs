//! # Work Queue
//!
//! At-least-once delivery of serialized [`WorkUnit`]s. A received message
//! stays invisible for the visibility timeout; if it is not acked by then it
//! is delivered again.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::models::WorkUnit;
use crate::models::queue_message::{ActiveModel, Column, Entity};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue database error: {0}")]
    Database(#[from] DbErr),
    #[error("Work unit serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One received message. `body` is the raw payload as it was sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: Uuid,
    pub body: String,
    /// Times this message has been received, including this one.
    pub attempts: u32,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn send(&self, unit: &WorkUnit) -> Result<(), QueueError>;
    /// Claims the oldest visible message, if any.
    async fn receive(&self) -> Result<Option<Delivery>, QueueError>;
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Queue stored in the `queue_messages` table.
#[derive(Debug, Clone)]
pub struct DbWorkQueue {
    db: DatabaseConnection,
    visibility_timeout: Duration,
}

impl DbWorkQueue {
    pub fn new(db: DatabaseConnection, visibility_timeout: Duration) -> Self {
        Self {
            db,
            visibility_timeout,
        }
    }

    /// Messages not yet acked, visible or not.
    pub async fn pending(&self) -> Result<u64, QueueError> {
        Ok(Entity::find().count(&self.db).await?)
    }
}

#[async_trait]
impl WorkQueue for DbWorkQueue {
    async fn send(&self, unit: &WorkUnit) -> Result<(), QueueError> {
        let now = now_ms();
        let message = ActiveModel {
            id: Set(Uuid::new_v4()),
            body: Set(unit.to_json()?),
            attempts: Set(0),
            enqueued_at_ms: Set(now),
            visible_at_ms: Set(now),
        };
        Entity::insert(message).exec_without_returning(&self.db).await?;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let now = now_ms();
        let Some(candidate) = Entity::find()
            .filter(Column::VisibleAtMs.lte(now))
            .order_by_asc(Column::EnqueuedAtMs)
            .one(&self.db)
            .await?
        else {
            return Ok(None);
        };

        let invisible_until = now + self.visibility_timeout.as_millis() as i64;
        let claimed = Entity::update_many()
            .col_expr(Column::VisibleAtMs, Expr::value(invisible_until))
            .col_expr(Column::Attempts, Expr::col(Column::Attempts).add(1))
            .filter(Column::Id.eq(candidate.id))
            .filter(Column::VisibleAtMs.eq(candidate.visible_at_ms))
            .exec(&self.db)
            .await?;

        if claimed.rows_affected == 0 {
            debug!(message_id = %candidate.id, "Message claimed by another consumer");
            return Ok(None);
        }

        Ok(Some(Delivery {
            id: candidate.id,
            body: candidate.body,
            attempts: (candidate.attempts + 1).max(1) as u32,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        Entity::delete_by_id(delivery.id).exec(&self.db).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryQueue {
    ready: VecDeque<Delivery>,
    in_flight: HashMap<Uuid, Delivery>,
}

/// FIFO queue held in process memory.
///
/// Received messages are kept in flight until acked;
/// [`InMemoryWorkQueue::redeliver_unacked`] stands in for the visibility
/// timeout.
#[derive(Debug, Default)]
pub struct InMemoryWorkQueue {
    inner: Mutex<MemoryQueue>,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a payload verbatim, without serializing a [`WorkUnit`].
    pub async fn send_raw(&self, body: impl Into<String>) {
        self.inner.lock().await.ready.push_back(Delivery {
            id: Uuid::new_v4(),
            body: body.into(),
            attempts: 0,
        });
    }

    /// Ready messages that parse as work units, in delivery order.
    pub async fn pending_units(&self) -> Vec<WorkUnit> {
        self.inner
            .lock()
            .await
            .ready
            .iter()
            .filter_map(|delivery| WorkUnit::from_json(&delivery.body).ok())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.ready.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Moves every unacked message back to the front of the queue.
    pub async fn redeliver_unacked(&self) {
        let mut inner = self.inner.lock().await;
        let in_flight: Vec<Delivery> = inner.in_flight.drain().map(|(_, d)| d).collect();
        for delivery in in_flight {
            inner.ready.push_front(delivery);
        }
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn send(&self, unit: &WorkUnit) -> Result<(), QueueError> {
        let body = unit.to_json()?;
        self.send_raw(body).await;
        Ok(())
    }

    async fn receive(&self) -> Result<Option<Delivery>, QueueError> {
        let mut inner = self.inner.lock().await;
        let Some(mut delivery) = inner.ready.pop_front() else {
            return Ok(None);
        };
        delivery.attempts += 1;
        inner.in_flight.insert(delivery.id, delivery.clone());
        Ok(Some(delivery))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        self.inner.lock().await.in_flight.remove(&delivery.id);
        Ok(())
    }
}
