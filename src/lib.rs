//! # Catalog Sync
//!
//! Queue-driven ingestion of the tire and wheel catalogs into a relational
//! store, with a small HTTP API to start, stop and inspect runs.

pub mod bulk;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod ingestion;
pub mod models;
pub mod pipeline;
pub mod rebates;
pub mod repositories;
pub mod run_controller;
pub mod server;
pub mod telemetry;
pub mod worker;
pub use migration;
