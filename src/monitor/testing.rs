//! Deterministic collaborators for monitor tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::fetch::{FetchError, ValueFetcher};
use crate::notify::{Notifier, NotifyError, PriceAlert};
use crate::store::{MemoryStore, Store, StoreError};
use crate::tracking::{Registration, ResourceId, StateUpdate, TrackedResource};

#[derive(Clone, Copy)]
enum Fallback {
    Value(f64),
    Fail,
    Hang,
}

/// Fetcher answering from per-locator scripts
///
/// Queued results are consumed first; afterwards the locator's fallback
/// applies, and an unscripted locator fails.
#[derive(Default)]
pub struct ScriptedFetcher {
    queued: Mutex<HashMap<String, VecDeque<Result<f64, FetchError>>>>,
    fallback: Mutex<HashMap<String, Fallback>>,
    calls: Mutex<HashMap<String, usize>>,
    delay: Mutex<Option<Duration>>,
    in_flight: Mutex<HashMap<String, usize>>,
    max_in_flight_per_locator: AtomicUsize,
    total_in_flight: AtomicUsize,
    max_total_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, locator: &str, result: Result<f64, FetchError>) {
        self.queued
            .lock()
            .entry(locator.to_string())
            .or_default()
            .push_back(result);
    }

    pub fn always(&self, locator: &str, value: f64) {
        self.fallback
            .lock()
            .insert(locator.to_string(), Fallback::Value(value));
    }

    pub fn always_fail(&self, locator: &str) {
        self.fallback.lock().insert(locator.to_string(), Fallback::Fail);
    }

    pub fn hang(&self, locator: &str) {
        self.fallback.lock().insert(locator.to_string(), Fallback::Hang);
    }

    /// Make every fetch take this long
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn calls(&self, locator: &str) -> usize {
        self.calls.lock().get(locator).copied().unwrap_or(0)
    }

    /// Highest number of simultaneous fetches seen for any single locator
    pub fn max_in_flight_per_locator(&self) -> usize {
        self.max_in_flight_per_locator.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous fetches seen overall
    pub fn max_total_in_flight(&self) -> usize {
        self.max_total_in_flight.load(Ordering::SeqCst)
    }

    fn enter(&self, locator: &str) {
        *self.calls.lock().entry(locator.to_string()).or_default() += 1;

        let per_locator = {
            let mut in_flight = self.in_flight.lock();
            let n = in_flight.entry(locator.to_string()).or_default();
            *n += 1;
            *n
        };
        self.max_in_flight_per_locator
            .fetch_max(per_locator, Ordering::SeqCst);

        let total = self.total_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_total_in_flight.fetch_max(total, Ordering::SeqCst);
    }

    fn leave(&self, locator: &str) {
        if let Some(n) = self.in_flight.lock().get_mut(locator) {
            *n -= 1;
        }
        self.total_in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn next_result(&self, locator: &str) -> Option<Result<f64, FetchError>> {
        if let Some(result) = self
            .queued
            .lock()
            .get_mut(locator)
            .and_then(|q| q.pop_front())
        {
            return Some(result);
        }

        match self.fallback.lock().get(locator).copied() {
            Some(Fallback::Value(v)) => Some(Ok(v)),
            Some(Fallback::Fail) | None => {
                Some(Err(FetchError::Network("scripted failure".to_string())))
            }
            Some(Fallback::Hang) => None,
        }
    }
}

/// Decrements in-flight counters even when the fetch future is dropped
struct InFlight<'a> {
    fetcher: &'a ScriptedFetcher,
    locator: &'a str,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.fetcher.leave(self.locator);
    }
}

#[async_trait]
impl ValueFetcher for ScriptedFetcher {
    async fn fetch(&self, locator: &str) -> Result<f64, FetchError> {
        self.enter(locator);
        let _guard = InFlight {
            fetcher: self,
            locator,
        };

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_result(locator) {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

/// Notifier that records every successful send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, PriceAlert)>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_sends(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Make every send take this long
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn sent(&self) -> Vec<(String, PriceAlert)> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, recipient: &str, alert: &PriceAlert) -> Result<(), NotifyError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Webhook("scripted failure".to_string()));
        }
        self.sent.lock().push((recipient.to_string(), alert.clone()));
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Store wrapper with switchable failures
pub struct FailingStore {
    inner: Arc<MemoryStore>,
    fail_updates: AtomicBool,
    fail_list: AtomicBool,
}

impl FailingStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_updates: AtomicBool::new(false),
            fail_list: AtomicBool::new(false),
        }
    }

    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for FailingStore {
    async fn list_all(&self) -> Result<Vec<TrackedResource>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("scripted list failure".to_string()));
        }
        self.inner.list_all().await
    }

    async fn create_if_absent(
        &self,
        locator: &str,
        threshold: f64,
    ) -> Result<Registration, StoreError> {
        self.inner.create_if_absent(locator, threshold).await
    }

    async fn update_state(&self, id: ResourceId, update: StateUpdate) -> Result<(), StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("scripted write failure".to_string()));
        }
        self.inner.update_state(id, update).await
    }

    async fn get(&self, id: ResourceId) -> Result<Option<TrackedResource>, StoreError> {
        self.inner.get(id).await
    }
}
