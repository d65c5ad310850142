//! Catalog and action discriminants carried by every work unit.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One of the two upstream product catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Catalog {
    Tires,
    Wheels,
}

impl Catalog {
    pub const ALL: [Catalog; 2] = [Catalog::Tires, Catalog::Wheels];

    pub fn as_str(&self) -> &'static str {
        match self {
            Catalog::Tires => "tires",
            Catalog::Wheels => "wheels",
        }
    }

    /// Prefix of this catalog's relational tables (`tire_products`, ...).
    pub fn table_prefix(&self) -> &'static str {
        match self {
            Catalog::Tires => "tire",
            Catalog::Wheels => "wheel",
        }
    }

    /// Catalog walked after this one within a pass, if any.
    pub fn next(&self) -> Option<Catalog> {
        match self {
            Catalog::Tires => Some(Catalog::Wheels),
            Catalog::Wheels => None,
        }
    }
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Collect,
    Update,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Collect => "collect",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }

    pub fn requires_watermark(&self) -> bool {
        matches!(self, Action::Update | Action::Delete)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
