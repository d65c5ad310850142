//! GraphQL client for the upstream catalog API.

use std::future::Future;
use std::time::Duration;

use metrics::counter;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument, warn};
use url::Url;

use super::{FetchError, Page, PageRequest};
use crate::config::CatalogApiConfig;
use crate::models::{Catalog, Rebate};

const API_KEY_HEADER: &str = "x-api-key";
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    data: Option<Map<String, Value>>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
    #[serde(rename = "pageInfo")]
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    #[serde(default)]
    total_count: Option<u64>,
}

/// HTTP client for the catalog API.
#[derive(Debug, Clone)]
pub struct CatalogApiClient {
    http: Client,
    endpoint: Url,
    api_key: Option<String>,
    max_attempts: u32,
}

impl CatalogApiClient {
    pub fn new(
        endpoint: Url,
        api_key: Option<String>,
        timeout: Duration,
        max_attempts: u32,
    ) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Configuration {
                details: e.to_string(),
            })?;

        Ok(Self {
            http,
            endpoint,
            api_key,
            max_attempts: max_attempts.max(1),
        })
    }

    pub fn from_config(config: &CatalogApiConfig) -> Result<Self, FetchError> {
        let endpoint = Url::parse(&config.url).map_err(|e| FetchError::Configuration {
            details: format!("invalid catalog API url '{}': {e}", config.url),
        })?;
        Self::new(
            endpoint,
            config.api_key.clone(),
            config.timeout(),
            config.fetch_max_attempts,
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Fetches one page of `collection`.
    ///
    /// Retries the identical request up to `max_attempts` times. When every
    /// attempt fails the result is [`Page::exhausted`], never an error.
    #[instrument(skip_all, fields(collection = %collection, offset = request.offset, limit = request.limit))]
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        operation: &str,
        collection: &str,
        selection: &str,
        request: &PageRequest,
    ) -> Page<T> {
        let query = build_page_query(operation, collection, selection, request);
        let query = query.as_str();

        match fetch_with_retry(self.max_attempts, move || {
            self.query_page::<T>(collection, query)
        })
        .await
        {
            Ok(page) => page,
            Err(err) => {
                warn!(
                    collection = %collection,
                    offset = request.offset,
                    attempts = self.max_attempts,
                    error = %err,
                    "Catalog page fetch exhausted retries; treating as end of data"
                );
                Page::exhausted()
            }
        }
    }

    /// Fetches the full rebate set for `catalog` in one request.
    #[instrument(skip_all, fields(catalog = %catalog))]
    pub async fn fetch_rebates(&self, catalog: Catalog) -> Result<Vec<Rebate>, FetchError> {
        let field = deals_field(catalog);
        let query = format!(
            "query {} {{ {field} {{ {} }} }}",
            deals_operation(catalog),
            Rebate::SELECTION
        );

        let mut data = self.post_query(&query).await?;
        let deals = data.remove(field).ok_or_else(|| FetchError::MissingField {
            field: field.to_string(),
        })?;
        if deals.is_null() {
            return Ok(Vec::new());
        }

        let rebates: Vec<Rebate> =
            serde_json::from_value(deals).map_err(|e| FetchError::MalformedResponse {
                details: e.to_string(),
            })?;
        debug!(catalog = %catalog, count = rebates.len(), "Fetched rebates");
        Ok(rebates)
    }

    async fn query_page<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &str,
    ) -> Result<Page<T>, FetchError> {
        let mut data = self.post_query(query).await?;
        let connection = data
            .remove(collection)
            .ok_or_else(|| FetchError::MissingField {
                field: collection.to_string(),
            })?;

        let connection: Connection<T> =
            serde_json::from_value(connection).map_err(|e| FetchError::MalformedResponse {
                details: e.to_string(),
            })?;

        Ok(Page {
            items: connection.items,
            has_next_page: connection.page_info.has_next_page,
            total_count: connection.page_info.total_count.unwrap_or(0),
            degraded: false,
        })
    }

    /// POSTs `{"query": query}` and returns the `data` object.
    async fn post_query(&self, query: &str) -> Result<Map<String, Value>, FetchError> {
        let mut request = self
            .http
            .post(self.endpoint.clone())
            .json(&json!({ "query": query }));
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .ok()
                .map(|text| text.chars().take(MAX_ERROR_BODY_CHARS).collect());
            return Err(FetchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: GraphQlEnvelope =
            response
                .json()
                .await
                .map_err(|e| FetchError::MalformedResponse {
                    details: e.to_string(),
                })?;

        if let Some(errors) = envelope.errors.filter(|errors| !errors.is_empty()) {
            return Err(FetchError::Api {
                messages: errors.into_iter().map(|e| e.message).collect(),
            });
        }

        envelope.data.ok_or_else(|| FetchError::MalformedResponse {
            details: "response carried no data".to_string(),
        })
    }
}

/// Runs `attempt` until it succeeds or `max_attempts` calls have failed.
/// No delay between attempts.
pub async fn fetch_with_retry<T, F, Fut>(max_attempts: u32, mut attempt: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut made = 0;

    loop {
        made += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                counter!("catalog_fetch_attempts_failed_total").increment(1);
                warn!(attempt = made, max_attempts, error = %err, "Catalog fetch attempt failed");
                if made >= max_attempts {
                    return Err(err);
                }
            }
        }
    }
}

/// Paginated query text for one page request.
pub fn build_page_query(
    operation: &str,
    collection: &str,
    selection: &str,
    request: &PageRequest,
) -> String {
    let mut arguments = format!("limit: {}, offset: {}", request.limit, request.offset);
    if let Some(watermark) = &request.updated_after {
        arguments.push_str(", updatedAfter: ");
        arguments.push_str(&quote(watermark));
    }
    if request.deleted {
        arguments.push_str(", deleted: true");
    }

    format!(
        "query {operation} {{ {collection}({arguments}) {{ items {{ {selection} }} pageInfo {{ hasNextPage totalCount }} }} }}"
    )
}

fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

fn deals_field(catalog: Catalog) -> &'static str {
    match catalog {
        Catalog::Tires => "tireDeals",
        Catalog::Wheels => "wheelDeals",
    }
}

fn deals_operation(catalog: Catalog) -> &'static str {
    match catalog {
        Catalog::Tires => "TireDeals",
        Catalog::Wheels => "WheelDeals",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn page_query_carries_filters() {
        let request = PageRequest::deleted_after(40, 20, "2025-02-20T10:00:00.000Z");
        let query = build_page_query("AllTires", "allTires", "id", &request);

        assert!(query.starts_with("query AllTires { allTires(limit: 20, offset: 40"));
        assert!(query.contains("updatedAfter: \"2025-02-20T10:00:00.000Z\""));
        assert!(query.contains("deleted: true"));
        assert!(query.contains("items { id }"));
        assert!(query.contains("pageInfo { hasNextPage totalCount }"));
    }

    #[test]
    fn plain_page_query_has_no_filters() {
        let query = build_page_query("AllWheels", "allWheels", "id", &PageRequest::new(0, 500));
        assert!(query.contains("allWheels(limit: 500, offset: 0)"));
        assert!(!query.contains("updatedAfter"));
        assert!(!query.contains("deleted"));
    }

    #[test]
    fn watermark_is_escaped() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[tokio::test]
    async fn retry_stops_after_max_attempts() {
        let calls = Cell::new(0);
        let result: Result<(), FetchError> = fetch_with_retry(3, || {
            calls.set(calls.get() + 1);
            async {
                Err(FetchError::Network {
                    details: "connection refused".to_string(),
                })
            }
        })
        .await;

        assert_eq!(calls.get(), 3);
        assert!(matches!(result, Err(FetchError::Network { .. })));
    }

    #[tokio::test]
    async fn retry_returns_first_success() {
        let calls = Cell::new(0);
        let result = fetch_with_retry(3, || {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                if attempt < 2 {
                    Err(FetchError::Http {
                        status: 502,
                        body: None,
                    })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.get(), 2);
    }
}
