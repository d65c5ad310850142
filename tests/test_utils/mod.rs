//! Test utilities shared by the integration tests.
//!
//! In-memory SQLite with migrations applied, catalog API fixtures and a
//! wiremock matcher for GraphQL query text.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use catalog_sync::bulk::BulkWriter;
use catalog_sync::catalog::{CatalogApiClient, CatalogRegistry};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use serde_json::{Value, json};
use wiremock::matchers::method;
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

pub const MAX_PARAMS: usize = 100;

/// Sets up an in-memory SQLite database with all migrations applied.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1);
    let db = Database::connect(options).await?;

    Migrator::up(&db, None).await?;

    Ok(db)
}

pub async fn count_rows(db: &DatabaseConnection, table: &str) -> Result<i64> {
    let row = db
        .query_one(Statement::from_string(
            db.get_database_backend(),
            format!("SELECT COUNT(*) AS n FROM {table}"),
        ))
        .await?
        .ok_or_else(|| anyhow::anyhow!("count query returned no row"))?;
    Ok(row.try_get::<i64>("", "n")?)
}

/// Values of `column` in `table`, ordered by `order_by`.
pub async fn column_values(
    db: &DatabaseConnection,
    table: &str,
    column: &str,
    order_by: &str,
) -> Result<Vec<Option<String>>> {
    let rows = db
        .query_all(Statement::from_string(
            db.get_database_backend(),
            format!("SELECT {column} AS v FROM {table} ORDER BY {order_by}"),
        ))
        .await?;
    rows.iter()
        .map(|row| row.try_get::<Option<String>>("", "v").map_err(Into::into))
        .collect()
}

pub fn api_client(server: &MockServer) -> Arc<CatalogApiClient> {
    let endpoint = format!("{}/graphql", server.uri()).parse().unwrap();
    Arc::new(
        CatalogApiClient::new(endpoint, Some("test-key".to_string()), Duration::from_secs(5), 3)
            .unwrap(),
    )
}

pub fn api_registry(server: &MockServer, db: &DatabaseConnection) -> CatalogRegistry {
    CatalogRegistry::with_api(api_client(server), BulkWriter::new(db.clone(), MAX_PARAMS))
}

pub fn tire_json(id: u64, brand: &str, model: &str) -> Value {
    json!({
        "id": id,
        "availability": "In Stock",
        "brand": brand,
        "modelName": model,
        "price": 99.5,
        "warranty": "60,000 miles",
        "size": { "aspectRatio": 65, "diameter": 17, "width": 225 },
        "rebate": null
    })
}

pub fn wheel_json(id: u64, brand: &str, model: &str) -> Value {
    json!({
        "id": id.to_string(),
        "brand": brand,
        "modelName": model,
        "offset": 35,
        "lugs": 5,
        "size": { "boltPattern": "5x114.3", "diameter": 18, "width": 8.5 },
        "rebate": null
    })
}

pub fn rebate_json(id: &str) -> Value {
    json!({ "id": id, "title": format!("Rebate {id}"), "price": 50 })
}

pub fn page_body(collection: &str, items: Vec<Value>, has_next_page: bool, total_count: u64) -> Value {
    json!({
        "data": {
            collection: {
                "items": items,
                "pageInfo": { "hasNextPage": has_next_page, "totalCount": total_count }
            }
        }
    })
}

pub fn deals_body(field: &str, rebates: Vec<Value>) -> Value {
    json!({ "data": { field: rebates } })
}

/// Matches GraphQL requests whose query text contains every `include`
/// fragment and none of the `exclude` fragments.
pub struct QueryMatcher {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl QueryMatcher {
    pub fn containing(fragments: &[&str]) -> Self {
        Self {
            include: fragments.iter().map(|f| f.to_string()).collect(),
            exclude: Vec::new(),
        }
    }

    pub fn excluding(mut self, fragments: &[&str]) -> Self {
        self.exclude = fragments.iter().map(|f| f.to_string()).collect();
        self
    }
}

impl Match for QueryMatcher {
    fn matches(&self, request: &Request) -> bool {
        let Ok(body) = serde_json::from_slice::<Value>(&request.body) else {
            return false;
        };
        let Some(query) = body.get("query").and_then(Value::as_str) else {
            return false;
        };
        self.include.iter().all(|f| query.contains(f.as_str()))
            && !self.exclude.iter().any(|f| query.contains(f.as_str()))
    }
}

/// Mounts a JSON response for queries matching `matcher`.
pub async fn mount_query(server: &MockServer, matcher: QueryMatcher, body: Value) {
    Mock::given(method("POST"))
        .and(matcher)
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Both deal lists, empty.
pub async fn mount_empty_deals(server: &MockServer) {
    mount_query(
        server,
        QueryMatcher::containing(&["tireDeals"]),
        deals_body("tireDeals", Vec::new()),
    )
    .await;
    mount_query(
        server,
        QueryMatcher::containing(&["wheelDeals"]),
        deals_body("wheelDeals", Vec::new()),
    )
    .await;
}
