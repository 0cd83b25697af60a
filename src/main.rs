//! Pricewatch Server
//!
//! Run with: cargo run
//!
//! Configuration is read from `PRICEWATCH_*` environment variables, see
//! [`pricewatch::config`] for the full list. Log level follows `RUST_LOG`
//! (default: info).

use pricewatch::api::run_server;
use pricewatch::config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pricewatch=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    tracing::info!("Pricewatch configuration:");
    tracing::info!("  Host: {}:{}", config.host, config.port);
    tracing::info!("  Tick interval: {:?}", config.tick_interval);
    tracing::info!("  Fetch timeout: {:?}", config.fetch_timeout);
    match config.max_concurrency {
        Some(limit) => tracing::info!("  Max concurrency: {}", limit),
        None => tracing::info!("  Max concurrency: unbounded"),
    }
    tracing::info!("  Drain on shutdown: {}", config.drain_on_shutdown);
    tracing::info!("  Database: {}", config.database_path.display());
    tracing::info!("  Notifier: {}", config.notifier_name());
    tracing::info!("  Recipients: {}", config.recipients.len());
    if config.allowed_hosts.is_empty() {
        tracing::info!("  Allowed hosts: any");
    } else {
        tracing::info!("  Allowed hosts: {}", config.allowed_hosts.join(", "));
    }

    if config.recipients.is_empty() {
        tracing::warn!("No recipients configured, alerts will not be delivered");
    }

    run_server(config).await
}
