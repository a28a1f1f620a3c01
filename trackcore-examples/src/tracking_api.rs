//! # Order Tracking API Example
//!
//! Serves the REST API from [`trackcore_examples::api`] over the in-memory
//! store, logging every status change through `LoggingDispatcher`.
//!
//! ```bash
//! RUST_LOG=trackcore=debug,info cargo run --example tracking_api
//! ```
//!
//! Listens on `TRACKCORE_ADDR` (default `127.0.0.1:3000`); the other
//! `TRACKCORE_*` variables are described in [`trackcore_examples::settings`].

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trackcore::{LoggingDispatcher, TrackingService};
use trackcore_examples::{config_from_env, create_app, AppState};
use trackcore_memory::InMemoryOrderStore;

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = config_from_env()?;
    let addr = std::env::var("TRACKCORE_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    info!(?config, %addr, "Starting order tracking API");

    let store = Arc::new(InMemoryOrderStore::new());
    let service = TrackingService::new(store, Arc::new(LoggingDispatcher), config);
    let state = AppState::new(service);
    let app = create_app(state.clone());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Could not listen for shutdown signal: {}", e);
            }
        })
        .await
        .context("serving HTTP")?;

    match Arc::try_unwrap(state.service) {
        Ok(service) => {
            let stats = service.shutdown().await;
            info!(?stats, "Notification queue drained");
        }
        Err(_) => warn!("Service still shared at shutdown, pending notifications are dropped"),
    }
    Ok(())
}
