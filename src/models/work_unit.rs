//! Queue message payload describing one page of work.

use serde::{Deserialize, Serialize};

use super::catalog::{Action, Catalog};

/// A single page of work for one catalog within one run.
///
/// Only ever exists as a queued message body and may be delivered more than
/// once. Field names on the wire are kept stable for messages already queued:
/// `type`, `lastUpdate` and `sessionId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    #[serde(rename = "type")]
    pub catalog: Catalog,
    pub action: Action,
    pub offset: u64,
    #[serde(rename = "lastUpdate", default)]
    pub watermark: Option<String>,
    #[serde(rename = "sessionId")]
    pub run_id: i64,
}

impl WorkUnit {
    pub fn collect(catalog: Catalog, offset: u64, run_id: i64) -> Self {
        Self {
            catalog,
            action: Action::Collect,
            offset,
            watermark: None,
            run_id,
        }
    }

    pub fn with_watermark(
        catalog: Catalog,
        action: Action,
        offset: u64,
        watermark: impl Into<String>,
        run_id: i64,
    ) -> Self {
        Self {
            catalog,
            action,
            offset,
            watermark: Some(watermark.into()),
            run_id,
        }
    }

    /// Non-empty watermark, if present.
    pub fn watermark(&self) -> Option<&str> {
        self.watermark.as_deref().filter(|w| !w.is_empty())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}
