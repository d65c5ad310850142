//! # Run State Store
//!
//! Persists the singleton [`RunRecord`] and the last successful watermark.
//! The SeaORM store keeps both as rows of the `kv_entries` table under the
//! keys [`RUN_STATE_KEY`] and [`WATERMARK_KEY`].

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{DatabaseConnection, DbErr, EntityTrait, Set};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::kv_entry::{ActiveModel, Column, Entity};
use crate::models::RunRecord;

pub const RUN_STATE_KEY: &str = "systemState";
pub const WATERMARK_KEY: &str = "lastUpdate";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Run state database error: {0}")]
    Database(#[from] DbErr),
    #[error("Run record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait RunStateStore: Send + Sync {
    async fn load_run(&self) -> Result<Option<RunRecord>, StoreError>;
    async fn save_run(&self, record: &RunRecord) -> Result<(), StoreError>;
    /// Watermark of the last finished run; empty values read as `None`.
    async fn last_watermark(&self) -> Result<Option<String>, StoreError>;
    async fn save_watermark(&self, watermark: &str) -> Result<(), StoreError>;
}

/// Run state in the `kv_entries` table.
#[derive(Debug, Clone)]
pub struct SeaOrmRunStateStore {
    db: DatabaseConnection,
}

impl SeaOrmRunStateStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, DbErr> {
        let entry = Entity::find_by_id(key.to_string()).one(&self.db).await?;
        Ok(entry.map(|entry| entry.value))
    }

    async fn put(&self, key: &str, value: String) -> Result<(), DbErr> {
        let entry = ActiveModel {
            key: Set(key.to_string()),
            value: Set(value),
            updated_at: Set(Utc::now().fixed_offset()),
        };

        Entity::insert(entry)
            .on_conflict(
                OnConflict::column(Column::Key)
                    .update_columns([Column::Value, Column::UpdatedAt])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl RunStateStore for SeaOrmRunStateStore {
    async fn load_run(&self) -> Result<Option<RunRecord>, StoreError> {
        match self.get(RUN_STATE_KEY).await? {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }

    async fn save_run(&self, record: &RunRecord) -> Result<(), StoreError> {
        let value = serde_json::to_string(record)?;
        self.put(RUN_STATE_KEY, value).await?;
        Ok(())
    }

    async fn last_watermark(&self) -> Result<Option<String>, StoreError> {
        let watermark = self.get(WATERMARK_KEY).await?;
        Ok(watermark.filter(|value| !value.is_empty()))
    }

    async fn save_watermark(&self, watermark: &str) -> Result<(), StoreError> {
        self.put(WATERMARK_KEY, watermark.to_string()).await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    run: Option<RunRecord>,
    watermark: Option<String>,
}

/// Process-local run state, used by tests.
#[derive(Debug, Default)]
pub struct InMemoryRunStateStore {
    state: Mutex<MemoryState>,
}

impl InMemoryRunStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_run(record: RunRecord) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                run: Some(record),
                watermark: None,
            }),
        }
    }
}

#[async_trait]
impl RunStateStore for InMemoryRunStateStore {
    async fn load_run(&self) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.state.lock().await.run.clone())
    }

    async fn save_run(&self, record: &RunRecord) -> Result<(), StoreError> {
        self.state.lock().await.run = Some(record.clone());
        Ok(())
    }

    async fn last_watermark(&self) -> Result<Option<String>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.watermark.clone().filter(|value| !value.is_empty()))
    }

    async fn save_watermark(&self, watermark: &str) -> Result<(), StoreError> {
        self.state.lock().await.watermark = Some(watermark.to_string());
        Ok(())
    }
}
