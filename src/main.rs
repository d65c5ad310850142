//! # Catalog Sync Entry Point
//!
//! Loads configuration, prepares the database and runs the control API and
//! the queue worker until ctrl-c.

use std::sync::Arc;

use anyhow::Context;
use catalog_sync::{
    config::ConfigLoader,
    db::init_pool,
    pipeline::Pipeline,
    server::{AppState, run_server},
    telemetry::init_tracing,
};
use migration::{Migrator, MigratorTrait};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::new().load()?;
    init_tracing(&config)?;

    info!(profile = %config.profile, "Loaded configuration");
    if let Ok(redacted_json) = config.redacted_json() {
        info!(config = %redacted_json, "Effective configuration");
    }

    let db = init_pool(&config).await?;
    Migrator::up(&db, None)
        .await
        .context("Failed to apply database migrations")?;

    let pipeline = Pipeline::from_config(&config, db.clone())?;
    let worker = pipeline.worker(config.worker.tick_interval());
    let state = AppState {
        config: Arc::new(config),
        db,
        controller: pipeline.controller.clone(),
    };

    let shutdown = CancellationToken::new();
    let worker_handle = tokio::spawn(worker.run(shutdown.clone()));

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to listen for ctrl-c");
        }
        info!("Shutdown requested");
        signal_token.cancel();
    });

    let served = run_server(state, shutdown.clone()).await;
    shutdown.cancel();
    if let Err(err) = worker_handle.await {
        error!(error = %err, "Queue worker task panicked");
    }

    served
}
