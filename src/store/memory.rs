use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{Store, StoreError};
use crate::tracking::{Registration, ResourceId, StateUpdate, TrackedResource};

/// In-memory store sharded by resource ID
///
/// Nothing is persisted; records are gone when the process exits.
///
/// Records live in a `DashMap`, so writers to different IDs only contend
/// when they hash to the same shard. A second map indexes locators to keep
/// them unique.
pub struct MemoryStore {
    /// Records indexed by ID
    records: DashMap<ResourceId, TrackedResource>,
    /// Locator -> ID
    locators: DashMap<String, ResourceId>,
    /// Next ID to hand out
    next_id: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            locators: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_all(&self) -> Result<Vec<TrackedResource>, StoreError> {
        Ok(self.records.iter().map(|e| e.value().clone()).collect())
    }

    async fn create_if_absent(
        &self,
        locator: &str,
        threshold: f64,
    ) -> Result<Registration, StoreError> {
        if !threshold.is_finite() {
            return Err(StoreError::InvalidThreshold(threshold));
        }

        // The locator entry guard is held until the record is inserted, so
        // concurrent registrations of one locator cannot both create.
        match self.locators.entry(locator.to_string()) {
            Entry::Occupied(entry) => {
                let id = *entry.get();
                let resource = self
                    .records
                    .get(&id)
                    .map(|r| r.value().clone())
                    .ok_or(StoreError::NotFound(id))?;
                Ok(Registration {
                    resource,
                    created: false,
                })
            }
            Entry::Vacant(entry) => {
                let id = ResourceId(self.next_id.fetch_add(1, Ordering::SeqCst));
                let resource = TrackedResource::new(id, locator, threshold);
                self.records.insert(id, resource.clone());
                entry.insert(id);

                tracing::debug!(resource_id = %id, locator = %locator, "Resource registered");
                Ok(Registration {
                    resource,
                    created: true,
                })
            }
        }
    }

    async fn update_state(&self, id: ResourceId, update: StateUpdate) -> Result<(), StoreError> {
        let mut record = self.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.apply(&update);
        Ok(())
    }

    async fn get(&self, id: ResourceId) -> Result<Option<TrackedResource>, StoreError> {
        Ok(self.records.get(&id).map(|r| r.value().clone()))
    }
}
