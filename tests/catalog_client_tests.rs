//! Catalog API client against a mocked GraphQL endpoint.

mod test_utils;

use catalog_sync::catalog::{FetchError, Page, PageRequest};
use catalog_sync::models::{Catalog, CatalogProduct, TireProduct, WheelProduct};
use serde_json::json;
use test_utils::{
    QueryMatcher, api_client, deals_body, mount_query, page_body, rebate_json, tire_json, wheel_json,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn fetch_tires(server: &MockServer, request: PageRequest) -> Page<TireProduct> {
    api_client(server)
        .fetch_page(
            TireProduct::OPERATION,
            TireProduct::COLLECTION,
            TireProduct::SELECTION,
            &request,
        )
        .await
}

#[tokio::test]
async fn page_is_fetched_with_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/graphql"))
        .and(header("x-api-key", "test-key"))
        .and(QueryMatcher::containing(&["allTires(limit: 2, offset: 0)"]))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            "allTires",
            vec![tire_json(1, "Advanta", "AT"), tire_json(2, "Advanta", "AT")],
            true,
            6,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let page = fetch_tires(&server, PageRequest::new(0, 2)).await;

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].id, "1");
    assert!(page.has_next_page);
    assert_eq!(page.total_count, 6);
    assert!(!page.degraded);
}

#[tokio::test]
async fn fractional_numbers_do_not_reject_the_page() {
    let server = MockServer::start().await;
    let mut odd = tire_json(2, "Advanta", "AT");
    odd["maxInflationPressure"] = json!(44.5);
    odd["loadIndex"] = json!(104);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_body(
            "allTires",
            vec![tire_json(1, "Advanta", "AT"), odd, tire_json(3, "Advanta", "AT")],
            true,
            900,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let page = fetch_tires(&server, PageRequest::new(0, 3)).await;

    assert!(!page.degraded);
    assert_eq!(page.items.len(), 3);
    assert!(page.has_next_page);
    assert_eq!(page.total_count, 900);
    assert_eq!(page.items[1].max_inflation_pressure, Some(44.5));
    assert_eq!(page.items[1].load_index, Some(104.0));
}

#[tokio::test]
async fn failing_endpoint_is_called_three_times_then_yields_empty_page() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .expect(3)
        .mount(&server)
        .await;

    let page = fetch_tires(&server, PageRequest::new(0, 2)).await;

    assert!(page.items.is_empty());
    assert!(!page.has_next_page);
    assert_eq!(page.total_count, 0);
    assert!(page.degraded);
}

#[tokio::test]
async fn graphql_errors_count_as_failed_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "rate limited" }]
        })))
        .expect(3)
        .mount(&server)
        .await;

    let page = fetch_tires(&server, PageRequest::new(0, 2)).await;

    assert!(page.degraded);
}

#[tokio::test]
async fn update_and_delete_filters_reach_the_query() {
    let server = MockServer::start().await;
    mount_query(
        &server,
        QueryMatcher::containing(&["allWheels(limit: 5, offset: 10", "updatedAfter", "deleted: true"]),
        page_body("allWheels", vec![json!({ "id": 77 })], false, 1),
    )
    .await;

    let page: Page<WheelProduct> = api_client(&server)
        .fetch_page(
            WheelProduct::OPERATION,
            WheelProduct::COLLECTION,
            "id",
            &PageRequest::deleted_after(10, 5, "2025-02-20T10:00:00.000Z"),
        )
        .await;

    assert!(!page.degraded);
    assert_eq!(page.items[0].id, "77");
    assert!(page.items[0].brand.is_none());
}

#[tokio::test]
async fn wheel_items_deserialize_offset() {
    let server = MockServer::start().await;
    mount_query(
        &server,
        QueryMatcher::containing(&["allWheels"]),
        page_body("allWheels", vec![wheel_json(5, "Enkei", "RPF1")], false, 1),
    )
    .await;

    let page: Page<WheelProduct> = api_client(&server)
        .fetch_page(
            WheelProduct::OPERATION,
            WheelProduct::COLLECTION,
            WheelProduct::SELECTION,
            &PageRequest::new(0, 10),
        )
        .await;

    assert_eq!(page.items[0].offset, Some(35.0));
    assert_eq!(page.items[0].model_name.as_deref(), Some("RPF1"));
}

#[tokio::test]
async fn rebates_are_fetched_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(QueryMatcher::containing(&["tireDeals"]))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(deals_body("tireDeals", vec![rebate_json("A"), json!({ "id": 9 })])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let rebates = api_client(&server)
        .fetch_rebates(Catalog::Tires)
        .await
        .unwrap();

    let ids: Vec<_> = rebates.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "9"]);
}

#[tokio::test]
async fn rebate_http_error_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let err = api_client(&server)
        .fetch_rebates(Catalog::Wheels)
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Http { status: 403, .. }));
}
