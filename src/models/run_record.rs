//! Persisted run record: the only state shared between work unit invocations.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::catalog::Catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum RunStatus {
    Idle,
    Collecting,
    Updating,
    Finished,
    Stopped,
    Failed,
}

impl RunStatus {
    /// Collecting and Updating block a new run from starting.
    pub fn is_running(&self) -> bool {
        matches!(self, RunStatus::Collecting | RunStatus::Updating)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Idle => "Idle",
            RunStatus::Collecting => "Collecting",
            RunStatus::Updating => "Updating",
            RunStatus::Finished => "Finished",
            RunStatus::Stopped => "Stopped",
            RunStatus::Failed => "Failed",
        }
    }
}

/// Singleton describing the current (or last) run.
///
/// Stored as JSON under the `systemState` key; `lastSessionId` is the wire
/// name of the run id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    #[serde(rename = "lastSessionId")]
    pub run_id: i64,
    pub status: RunStatus,
    #[serde(default)]
    pub tires_processed: u64,
    #[serde(default)]
    pub tires_total: u64,
    #[serde(default)]
    pub wheels_processed: u64,
    #[serde(default)]
    pub wheels_total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Fresh record for a run starting at `now` with zeroed counters.
    pub fn start(run_id: i64, status: RunStatus, now: DateTime<Utc>) -> Self {
        Self {
            run_id,
            status,
            tires_processed: 0,
            tires_total: 0,
            wheels_processed: 0,
            wheels_total: 0,
            started_at: Some(now),
            updated_at: Some(now),
        }
    }

    pub fn record_progress(&mut self, catalog: Catalog, processed: u64, total: u64) {
        match catalog {
            Catalog::Tires => {
                self.tires_processed = processed;
                self.tires_total = total;
            }
            Catalog::Wheels => {
                self.wheels_processed = processed;
                self.wheels_total = total;
            }
        }
    }

    /// `(processed, total)` for one catalog.
    pub fn progress(&self, catalog: Catalog) -> (u64, u64) {
        match catalog {
            Catalog::Tires => (self.tires_processed, self.tires_total),
            Catalog::Wheels => (self.wheels_processed, self.wheels_total),
        }
    }

    /// Moves to `status` unless the run was stopped in the meantime.
    pub fn advance_status(&mut self, status: RunStatus) {
        if self.status != RunStatus::Stopped {
            self.status = status;
        }
    }

    /// Watermark recorded when this run finishes: the run's start time, so
    /// items changed while the run was in flight are picked up next time.
    pub fn finish_watermark(&self, now: DateTime<Utc>) -> String {
        format_watermark(self.started_at.unwrap_or(now))
    }
}

/// ISO-8601 with millisecond precision and a `Z` suffix.
pub fn format_watermark(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
