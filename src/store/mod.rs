//! Durable record of tracked resources
//!
//! The check engine only depends on the [`Store`] contract. [`SqliteStore`]
//! commits every write before returning and is what the server runs on.
//! [`MemoryStore`] keeps everything in process and loses it on exit.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::tracking::{Registration, ResourceId, StateUpdate, TrackedResource};

/// Store operations the monitor and the HTTP surface rely on
#[async_trait]
pub trait Store: Send + Sync {
    /// All currently tracked resources, in no particular order
    async fn list_all(&self) -> Result<Vec<TrackedResource>, StoreError>;

    /// Register a locator; a duplicate locator returns the existing record
    async fn create_if_absent(
        &self,
        locator: &str,
        threshold: f64,
    ) -> Result<Registration, StoreError>;

    /// Overwrite value, check time and alert flag of one resource in a single write
    async fn update_state(&self, id: ResourceId, update: StateUpdate) -> Result<(), StoreError>;

    /// Look up one resource
    async fn get(&self, id: ResourceId) -> Result<Option<TrackedResource>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Resource {0} not found")]
    NotFound(ResourceId),

    #[error("Invalid threshold {0}")]
    InvalidThreshold(f64),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
