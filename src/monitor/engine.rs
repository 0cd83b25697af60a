//! Per-resource check: fetch, decide, persist, notify

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::fetch::{FetchError, ValueFetcher};
use crate::notify::{Notifier, PriceAlert};
use crate::store::{Store, StoreError};
use crate::tracking::{AlertState, StateUpdate, TrackedResource, Transition};

/// Runs the check sequence for one resource at a time
pub struct CheckEngine {
    store: Arc<dyn Store>,
    fetcher: Arc<dyn ValueFetcher>,
    notifier: Arc<dyn Notifier>,
    /// Who receives alerts
    recipients: Arc<[String]>,
    /// Upper bound on a single fetch
    fetch_timeout: Duration,
}

impl CheckEngine {
    pub fn new(
        store: Arc<dyn Store>,
        fetcher: Arc<dyn ValueFetcher>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            fetcher,
            notifier,
            recipients: Vec::<String>::new().into(),
            fetch_timeout: Duration::from_secs(15),
        }
    }

    /// Set alert recipients
    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = recipients.into();
        self
    }

    /// Set the per-fetch timeout
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    /// Fetch the current value, bounded by the fetch timeout
    pub async fn fetch_value(&self, locator: &str) -> Result<f64, FetchError> {
        let value = tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(locator))
            .await
            .map_err(|_| FetchError::Timeout(self.fetch_timeout))??;

        if !value.is_finite() || value < 0.0 {
            return Err(FetchError::InvalidValue(value));
        }
        Ok(value)
    }

    /// Check one resource.
    ///
    /// Failures stay local to this resource: a failed fetch leaves the stored
    /// state untouched, and a failed write suppresses the notification.
    pub async fn check(&self, resource: &TrackedResource) -> CheckOutcome {
        tracing::debug!(
            resource_id = %resource.id,
            locator = %resource.locator,
            "Checking resource"
        );

        let value = match self.fetch_value(&resource.locator).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    resource_id = %resource.id,
                    locator = %resource.locator,
                    error = %e,
                    "Fetch failed"
                );
                return CheckOutcome::FetchFailed(e);
            }
        };

        let transition = AlertState::from(resource.alert_active).next(value, resource.threshold);
        let checked_at = Utc::now();

        let update = StateUpdate {
            value,
            checked_at,
            alert_active: transition.state.is_active(),
        };
        if let Err(e) = self.store.update_state(resource.id, update).await {
            tracing::error!(
                resource_id = %resource.id,
                locator = %resource.locator,
                error = %e,
                "Failed to persist state, notification suppressed"
            );
            return CheckOutcome::PersistFailed { value, error: e };
        }

        tracing::debug!(
            resource_id = %resource.id,
            price = value,
            alert_active = update.alert_active,
            "State updated"
        );

        let delivery = if transition.notify {
            tracing::info!(
                resource_id = %resource.id,
                locator = %resource.locator,
                price = value,
                threshold = resource.threshold,
                "Price below target"
            );
            let alert = PriceAlert {
                resource_id: resource.id,
                locator: resource.locator.clone(),
                price: value,
                threshold: resource.threshold,
                detected_at: checked_at,
            };
            // Delivery is detached from this check: once the state is stored,
            // aborting the check must not drop the alert.
            let task = tokio::spawn(deliver(
                Arc::clone(&self.notifier),
                Arc::clone(&self.recipients),
                alert,
            ));
            match task.await {
                Ok(delivery) => delivery,
                Err(e) => {
                    tracing::error!(
                        resource_id = %resource.id,
                        error = %e,
                        "Alert delivery task failed"
                    );
                    Delivery {
                        sent: 0,
                        failed: self.recipients.len(),
                    }
                }
            }
        } else {
            Delivery::default()
        };

        CheckOutcome::Updated {
            value,
            transition,
            delivery,
        }
    }
}

/// Send an alert to every recipient; failures are logged, not retried
async fn deliver(
    notifier: Arc<dyn Notifier>,
    recipients: Arc<[String]>,
    alert: PriceAlert,
) -> Delivery {
    if recipients.is_empty() {
        tracing::warn!(
            resource_id = %alert.resource_id,
            "No alert recipients configured"
        );
        return Delivery::default();
    }

    let sends = recipients
        .iter()
        .map(|recipient| notifier.send(recipient, &alert));
    let results = futures::future::join_all(sends).await;

    let mut delivery = Delivery::default();
    for (recipient, result) in recipients.iter().zip(results) {
        match result {
            Ok(()) => {
                delivery.sent += 1;
                tracing::info!(
                    resource_id = %alert.resource_id,
                    recipient = %recipient,
                    notifier = %notifier.name(),
                    "Alert sent"
                );
            }
            Err(e) => {
                delivery.failed += 1;
                tracing::error!(
                    resource_id = %alert.resource_id,
                    recipient = %recipient,
                    error = %e,
                    "Failed to send alert"
                );
            }
        }
    }
    delivery
}

/// Notification attempts made by one check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    pub sent: usize,
    pub failed: usize,
}

/// Result of checking one resource
#[derive(Debug)]
pub enum CheckOutcome {
    /// No value observed; state untouched
    FetchFailed(FetchError),
    /// Value observed but not stored; nothing sent
    PersistFailed { value: f64, error: StoreError },
    /// State stored, notification attempted if the transition required it
    Updated {
        value: f64,
        transition: Transition,
        delivery: Delivery,
    },
}

impl CheckOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, CheckOutcome::Updated { .. })
    }
}
