//! Upstream catalog access.
//!
//! [`client::CatalogApiClient`] issues the GraphQL page and rebate queries;
//! [`adapter::ProductCatalog`] turns one fetched page into brand, model and
//! product writes for a single catalog; [`registry::CatalogRegistry`] maps a
//! [`Catalog`](crate::models::Catalog) to its adapter.

pub mod adapter;
pub mod client;
pub mod registry;

pub use adapter::{CatalogAdapter, PageError, PageOutcome, ProductCatalog, TiresAdapter, WheelsAdapter};
pub use client::CatalogApiClient;
pub use registry::{CatalogRegistry, RegistryError};

use thiserror::Error;

/// Errors from a single request to the catalog API.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("HTTP error {status}: {}", body.as_deref().unwrap_or("No body"))]
    Http { status: u16, body: Option<String> },
    #[error("Network error: {details}")]
    Network { details: String },
    #[error("Malformed response: {details}")]
    MalformedResponse { details: String },
    #[error("API reported errors: {}", messages.join("; "))]
    Api { messages: Vec<String> },
    #[error("Response is missing the `{field}` field")]
    MissingField { field: String },
    #[error("Configuration error: {details}")]
    Configuration { details: String },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::MalformedResponse {
                details: err.to_string(),
            }
        } else {
            FetchError::Network {
                details: err.to_string(),
            }
        }
    }
}

/// Offset/limit window plus the optional change filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u64,
    pub updated_after: Option<String>,
    pub deleted: bool,
}

impl PageRequest {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit,
            updated_after: None,
            deleted: false,
        }
    }

    /// Items changed after `watermark`.
    pub fn updated_after(offset: u64, limit: u64, watermark: impl Into<String>) -> Self {
        Self {
            updated_after: Some(watermark.into()),
            ..Self::new(offset, limit)
        }
    }

    /// Items removed after `watermark`.
    pub fn deleted_after(offset: u64, limit: u64, watermark: impl Into<String>) -> Self {
        Self {
            deleted: true,
            ..Self::updated_after(offset, limit, watermark)
        }
    }
}

/// One page of items and its pagination metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_next_page: bool,
    pub total_count: u64,
    /// Set when the page is empty because every attempt failed.
    pub degraded: bool,
}

impl<T> Page<T> {
    /// Empty, final page returned after retries are exhausted.
    pub fn exhausted() -> Self {
        Self {
            items: Vec::new(),
            has_next_page: false,
            total_count: 0,
            degraded: true,
        }
    }
}
