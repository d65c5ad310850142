//! # Tests for Handlers
//!
//! Router-level tests over in-memory run state.

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tower::ServiceExt;

use crate::config::AppConfig;
use crate::handlers::root;
use crate::models::{Catalog, WorkUnit};
use crate::repositories::{InMemoryRunStateStore, InMemoryWorkQueue};
use crate::run_controller::RunController;
use crate::server::{AppState, create_app};

fn test_state() -> (AppState, Arc<InMemoryWorkQueue>) {
    let queue = Arc::new(InMemoryWorkQueue::new());
    let controller = RunController::new(Arc::new(InMemoryRunStateStore::new()), queue.clone());
    let state = AppState {
        config: Arc::new(AppConfig::default()),
        db: DatabaseConnection::default(),
        controller: Arc::new(controller),
    };
    (state, queue)
}

async fn send(state: AppState, method: &str, uri: &str) -> (StatusCode, Value) {
    let response = create_app(state)
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn root_returns_service_info() {
    let axum::Json(info) = root().await;
    assert_eq!(info.service, "catalog-sync");
    assert_eq!(info.version, env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn start_collect_returns_accepted_and_enqueues() {
    let (state, queue) = test_state();

    let (status, body) = send(state, "POST", "/runs/collect").await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "Collecting");
    let run_id = body["lastSessionId"].as_i64().unwrap();
    assert_eq!(
        queue.pending_units().await,
        vec![WorkUnit::collect(Catalog::Tires, 0, run_id)]
    );
}

#[tokio::test]
async fn second_start_conflicts() {
    let (state, _) = test_state();

    let (first, _) = send(state.clone(), "POST", "/runs/collect").await;
    let (second, body) = send(state, "POST", "/runs/update").await;

    assert_eq!(first, StatusCode::ACCEPTED);
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(body["code"], "RUN_IN_PROGRESS");
    assert!(body["trace_id"].is_string());
}

#[tokio::test]
async fn conflict_body_echoes_request_id() {
    let (state, _) = test_state();
    send(state.clone(), "POST", "/runs/collect").await;

    let response = create_app(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/runs/update")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["trace_id"], "req-42");
}

#[tokio::test]
async fn stop_then_state_reports_stopped() {
    let (state, _) = test_state();

    send(state.clone(), "POST", "/runs/collect").await;
    let (status, _) = send(state.clone(), "POST", "/runs/stop").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(state, "GET", "/runs/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["run"]["status"], "Stopped");
    assert!(body["lastWatermark"].is_null());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (state, _) = test_state();
    let (status, _) = send(state, "GET", "/runs/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn readyz_reports_unavailable_without_database() {
    let (state, _) = test_state();
    let (status, body) = send(state, "GET", "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn readyz_succeeds_with_database() {
    let (mut state, _) = test_state();
    state.db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();

    let (status, body) = send(state, "GET", "/readyz").await;

    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());
}
