//! Tracked resource records

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Store-assigned identifier of a tracked resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One monitored URL and its last known state
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedResource {
    /// Unique ID, assigned on creation
    pub id: ResourceId,
    /// What to fetch (unique across all resources)
    pub locator: String,
    /// Notify when the observed value drops strictly below this
    pub threshold: f64,
    /// Last successfully observed value (0 until the first check)
    pub last_value: f64,
    /// Time of the last successful state update
    pub last_checked_at: Option<DateTime<Utc>>,
    /// An alert was already sent for the current below-threshold episode
    pub alert_active: bool,
}

impl TrackedResource {
    /// Create a freshly registered resource that has never been checked
    pub fn new(id: ResourceId, locator: impl Into<String>, threshold: f64) -> Self {
        Self {
            id,
            locator: locator.into(),
            threshold,
            last_value: 0.0,
            last_checked_at: None,
            alert_active: false,
        }
    }

    /// Apply a state update as a single write
    pub fn apply(&mut self, update: &StateUpdate) {
        self.last_value = update.value;
        self.last_checked_at = Some(update.checked_at);
        self.alert_active = update.alert_active;
    }
}

/// New state produced by one successful check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateUpdate {
    pub value: f64,
    pub checked_at: DateTime<Utc>,
    pub alert_active: bool,
}

/// Result of registering a locator
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    /// The stored record (the existing one for duplicate locators)
    pub resource: TrackedResource,
    /// False when the locator was already tracked
    pub created: bool,
}
