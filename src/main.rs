// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Natours API Server
//!
//! Serves the tours, users and reviews REST API plus the static site.

use natours::{
    config::{Config, DatabaseBackend},
    db::{DocumentStore, FirestoreDb, InMemoryStore},
    services::{HttpMailer, LogMailer, Mailer},
    storage::S3Storage,
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        environment = ?config.environment,
        "Starting Natours API"
    );

    let db: Arc<dyn DocumentStore> = match config.database_backend {
        DatabaseBackend::Firestore => Arc::new(FirestoreDb::new(&config.gcp_project_id).await?),
        DatabaseBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            Arc::new(InMemoryStore::new())
        }
    };

    let storage = Arc::new(S3Storage::new(&config.storage).await?);

    let mailer: Arc<dyn Mailer> = match &config.email.api_key {
        Some(key) => Arc::new(HttpMailer::new(&config.email, key.clone())),
        None => {
            tracing::warn!("EMAIL_API_KEY not set, emails are only logged");
            Arc::new(LogMailer)
        }
    };

    let state = Arc::new(AppState::new(config.clone(), db, storage, mailer));

    // Build router
    let app = natours::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("natours=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
