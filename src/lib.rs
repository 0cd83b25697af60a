//! Pricewatch: periodic price checks with threshold alerts
//!
//! Tracks a set of product URLs, each with a target price. A scheduler
//! re-checks every tracked URL on a fixed interval, running the checks of a
//! tick concurrently, and notifies recipients when a price first drops below
//! its target. Alerts re-arm once the price climbs back to or above it.
//!
//! # Features
//!
//! - **Edge-triggered alerts**: one notification per drop, not one per tick
//! - **Concurrent ticks**: every check of a tick runs in parallel, optionally capped
//! - **Non-overlapping ticks**: a slow tick makes the scheduler skip, never stack
//! - **Pluggable collaborators**: `Store`, `ValueFetcher` and `Notifier` traits
//! - **Durable state**: every state change is committed to SQLite before any alert goes out
//!
//! # Example
//!
//! ```no_run
//! use pricewatch::monitor::{CheckEngine, Scheduler, SchedulerConfig};
//! use pricewatch::fetch::{HttpFetcherConfig, HttpPriceFetcher};
//! use pricewatch::notify::LogNotifier;
//! use pricewatch::store::{MemoryStore, Store};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! store.create_if_absent("https://shop.example/item", 499.0).await?;
//!
//! let fetcher = Arc::new(HttpPriceFetcher::new(HttpFetcherConfig::default())?);
//! let engine = Arc::new(
//!     CheckEngine::new(store, fetcher, Arc::new(LogNotifier))
//!         .with_recipients(vec!["ops@example.com".to_string()]),
//! );
//!
//! let scheduler = Arc::new(Scheduler::new(engine, SchedulerConfig::default()));
//! let report = scheduler.run_tick().await?;
//! println!("checked {} resources", report.resources);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod fetch;
pub mod monitor;
pub mod notify;
pub mod store;
pub mod tracking;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use monitor::{CheckEngine, Scheduler, SchedulerConfig};
pub use store::{MemoryStore, SqliteStore, Store, StoreError};
pub use tracking::{ResourceId, TrackedResource};
