use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{get_tracked, health_check, list_tracked, stats, track, AppState};
use crate::config::Config;
use crate::fetch::HttpPriceFetcher;
use crate::monitor::{CheckEngine, Scheduler};
use crate::notify::build_notifier;
use crate::store::SqliteStore;

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Tracking
        .route("/track", post(track))
        .route("/track", get(list_tracked))
        .route("/track/:id", get(get_tracked))
        // Stats
        .route("/stats", get(stats))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server and the background monitor until Ctrl-C
pub async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(SqliteStore::open(&config.database_path).await?);
    tracing::info!("Tracking {} resources", store.count().await?);

    let fetcher = Arc::new(HttpPriceFetcher::new(config.fetcher())?);
    let notifier = build_notifier(&config.notifier)?;

    let engine = Arc::new(
        CheckEngine::new(store.clone(), fetcher, notifier)
            .with_recipients(config.recipients.clone())
            .with_fetch_timeout(config.fetch_timeout),
    );

    // Start background scheduler
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&engine), config.scheduler()));
    let scheduler_handle = Arc::clone(&scheduler).start();

    let state = Arc::new(AppState {
        store: store.clone(),
        engine,
        status: scheduler.status(),
    });
    let app = build_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Starting pricewatch server on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown signal received, stopping scheduler...");
    scheduler.stop();
    if let Err(e) = scheduler_handle.await {
        tracing::error!(error = %e, "Scheduler task failed");
    }

    store.close().await;
    tracing::info!("pricewatch server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C, shutting down");
    }
}
