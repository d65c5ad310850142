//! QueueMessage entity model
//!
//! One pending work queue message. `visible_at_ms` is pushed forward when a
//! consumer claims the row; the row is deleted on ack.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "queue_messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Serialized work unit JSON, stored verbatim.
    #[sea_orm(column_type = "Text")]
    pub body: String,

    /// Number of times the message has been claimed.
    pub attempts: i32,

    pub enqueued_at_ms: i64,

    /// Epoch milliseconds after which the message may be claimed.
    pub visible_at_ms: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
