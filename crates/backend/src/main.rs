use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod adapters;
mod config;
pub mod error;
mod handlers;
mod notifier;
mod poller;
mod registration;
mod routes;
mod store;
#[cfg(test)]
mod testing;

use crate::adapters::AdapterRegistry;
use crate::config::AppConfig;
use crate::notifier::{Notifier, SlackNotifier};
use crate::poller::Poller;
use crate::registration::Registrar;
use crate::store::CalendarStore;

/// Shared handles for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CalendarStore>,
    pub poller: Arc<Poller>,
    pub registrar: Arc<Registrar>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "advent_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting advent calendar watcher");

    let config = AppConfig::from_env()?;

    // A corrupt storage file stops the process here
    let store = Arc::new(
        CalendarStore::open(&config.storage_path).context("Failed to open calendar storage")?,
    );

    let client = config.http_client()?;
    let adapters = AdapterRegistry::http(client.clone());
    let notifier: Arc<dyn Notifier> = Arc::new(SlackNotifier::new(client, config.slack.clone()));

    let poller = Arc::new(Poller::new(store.clone(), adapters.clone(), notifier));
    let registrar = Arc::new(Registrar::new(
        store.clone(),
        adapters,
        config.webhook_token.clone(),
        config.slack.bot_name.clone(),
    ));

    // Start calendar polling background task
    let poll_handle = tokio::spawn(poller::start_polling_task(
        poller.clone(),
        config.fetch_interval,
    ));

    let app = routes::app_routes(AppState {
        store,
        poller,
        registrar,
    });

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.host, config.port))?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poll_handle.abort();
    tracing::info!("Advent calendar watcher stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping...");
}
