//! # Server Configuration
//!
//! Router, shared state and the HTTP listener for the control API.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};
use sea_orm::DatabaseConnection;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::handlers;
use crate::run_controller::RunController;
use crate::telemetry::{TraceContext, with_trace_context};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DatabaseConnection,
    pub controller: Arc<RunController>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/readyz", get(handlers::readyz))
        .route("/runs/collect", post(handlers::runs::start_collect))
        .route("/runs/update", post(handlers::runs::start_update))
        .route("/runs/stop", post(handlers::runs::stop_run))
        .route("/runs/state", get(handlers::runs::run_state))
        .layer(middleware::from_fn(trace_context))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
}

/// Scopes the request in a [`TraceContext`], reusing `x-request-id` when
/// the caller sent one.
async fn trace_context(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok());
    let context = TraceContext::for_request(request_id);
    request.extensions_mut().insert(context.clone());
    with_trace_context(context, next.run(request)).await
}

/// Serves the control API until `shutdown` fires.
pub async fn run_server(state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let addr = state
        .config
        .bind_addr()
        .context("Invalid server address")?;
    let profile = state.config.profile.clone();
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, profile = %profile, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::root,
        crate::handlers::readyz,
        crate::handlers::runs::start_collect,
        crate::handlers::runs::start_update,
        crate::handlers::runs::stop_run,
        crate::handlers::runs::run_state,
    ),
    components(
        schemas(
            crate::models::ServiceInfo,
            crate::models::RunRecord,
            crate::models::RunStatus,
            crate::run_controller::RunSnapshot,
            crate::error::ApiError,
        )
    ),
    info(
        title = "Catalog Sync API",
        description = "Control API for tire and wheel catalog ingestion runs",
        version = env!("CARGO_PKG_VERSION"),
    )
)]
pub struct ApiDoc;
