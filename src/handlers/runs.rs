//! # Run Control Handlers
//!
//! Start, stop and inspect ingestion runs. Starting only records the run and
//! enqueues its first work unit; the queue worker does the rest.

use axum::{extract::State, http::StatusCode, response::Json};

use crate::error::ApiError;
use crate::models::RunRecord;
use crate::run_controller::RunSnapshot;
use crate::server::AppState;

/// Start a full collection of the tire and wheel catalogs
#[utoipa::path(
    post,
    path = "/runs/collect",
    responses(
        (status = 202, description = "Run started", body = RunRecord),
        (status = 409, description = "A run is already in progress", body = ApiError),
        (status = 500, description = "Run state unavailable", body = ApiError)
    ),
    tag = "runs"
)]
pub async fn start_collect(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RunRecord>), ApiError> {
    let record = state.controller.start_collecting().await?;
    Ok((StatusCode::ACCEPTED, Json(record)))
}

/// Start an incremental update from the last successful watermark
///
/// The update pass is followed by a delete pass for items removed upstream.
#[utoipa::path(
    post,
    path = "/runs/update",
    responses(
        (status = 202, description = "Run started", body = RunRecord),
        (status = 409, description = "A run is already in progress", body = ApiError),
        (status = 500, description = "Run state unavailable", body = ApiError)
    ),
    tag = "runs"
)]
pub async fn start_update(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<RunRecord>), ApiError> {
    let record = state.controller.start_updating().await?;
    Ok((StatusCode::ACCEPTED, Json(record)))
}

/// Stop the current run
#[utoipa::path(
    post,
    path = "/runs/stop",
    responses(
        (status = 200, description = "Run marked as stopped", body = RunRecord),
        (status = 500, description = "Run state unavailable", body = ApiError)
    ),
    tag = "runs"
)]
pub async fn stop_run(State(state): State<AppState>) -> Result<Json<RunRecord>, ApiError> {
    Ok(Json(state.controller.stop().await?))
}

/// Current run record and last successful watermark
#[utoipa::path(
    get,
    path = "/runs/state",
    responses(
        (status = 200, description = "Run state", body = RunSnapshot),
        (status = 500, description = "Run state unavailable", body = ApiError)
    ),
    tag = "runs"
)]
pub async fn run_state(State(state): State<AppState>) -> Result<Json<RunSnapshot>, ApiError> {
    Ok(Json(state.controller.state().await?))
}
