//! Periodic fan-out of resource checks

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{self, MissedTickBehavior};

use super::engine::{CheckEngine, CheckOutcome};
use crate::store::StoreError;

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between ticks
    pub interval: Duration,
    /// Cap on simultaneous checks within a tick; `None` is unbounded
    pub max_concurrency: Option<usize>,
    /// Let an in-flight tick finish on stop instead of aborting it.
    ///
    /// When aborting, checks still fetching or writing are dropped. A check
    /// whose state is already stored still delivers its alert, since delivery
    /// runs in its own task.
    pub drain_on_shutdown: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(20),
            max_concurrency: None,
            drain_on_shutdown: true,
        }
    }
}

/// Summary of one tick
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub tick: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    /// Resources in this tick's snapshot
    pub resources: usize,
    pub updated: usize,
    pub fetch_failed: usize,
    pub persist_failed: usize,
    /// Units that panicked
    pub aborted: usize,
    /// Checks that crossed below threshold
    pub alerts_raised: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    /// Tick deadlines that passed while this tick ran and will never fire.
    /// The first missed deadline is not counted; it fires as soon as this
    /// tick returns.
    pub coalesced_ticks: u64,
}

impl TickReport {
    fn new(tick: u64, started_at: DateTime<Utc>, resources: usize) -> Self {
        Self {
            tick,
            started_at,
            elapsed_ms: 0,
            resources,
            updated: 0,
            fetch_failed: 0,
            persist_failed: 0,
            aborted: 0,
            alerts_raised: 0,
            notifications_sent: 0,
            notifications_failed: 0,
            coalesced_ticks: 0,
        }
    }

    fn record(&mut self, outcome: &CheckOutcome) {
        match outcome {
            CheckOutcome::FetchFailed(_) => self.fetch_failed += 1,
            CheckOutcome::PersistFailed { .. } => self.persist_failed += 1,
            CheckOutcome::Updated {
                transition,
                delivery,
                ..
            } => {
                self.updated += 1;
                if transition.notify {
                    self.alerts_raised += 1;
                }
                self.notifications_sent += delivery.sent;
                self.notifications_failed += delivery.failed;
            }
        }
    }
}

/// Counters shared with the HTTP surface
#[derive(Debug, Default)]
pub struct SchedulerStatus {
    ticks_completed: AtomicU64,
    ticks_failed: AtomicU64,
    ticks_coalesced: AtomicU64,
    last_report: RwLock<Option<TickReport>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub ticks_completed: u64,
    pub ticks_failed: u64,
    pub ticks_coalesced: u64,
    pub last_report: Option<TickReport>,
}

impl SchedulerStatus {
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            ticks_completed: self.ticks_completed.load(Ordering::SeqCst),
            ticks_failed: self.ticks_failed.load(Ordering::SeqCst),
            ticks_coalesced: self.ticks_coalesced.load(Ordering::SeqCst),
            last_report: self.last_report.read().clone(),
        }
    }

    pub fn ticks_completed(&self) -> u64 {
        self.ticks_completed.load(Ordering::SeqCst)
    }

    fn record(&self, report: &TickReport) {
        self.ticks_completed.fetch_add(1, Ordering::SeqCst);
        self.ticks_coalesced
            .fetch_add(report.coalesced_ticks, Ordering::SeqCst);
        *self.last_report.write() = Some(report.clone());
    }
}

/// Runs every tracked resource through the check engine on a fixed interval.
///
/// Ticks never overlap: each tick waits for all of its checks, and tick
/// deadlines missed meanwhile are skipped rather than queued.
pub struct Scheduler {
    engine: Arc<CheckEngine>,
    config: SchedulerConfig,
    limiter: Option<Arc<Semaphore>>,
    status: Arc<SchedulerStatus>,
    ticks: AtomicU64,
    shutdown: watch::Sender<bool>,
}

impl Scheduler {
    pub fn new(engine: Arc<CheckEngine>, config: SchedulerConfig) -> Self {
        let limiter = config
            .max_concurrency
            .filter(|n| *n > 0)
            .map(|n| Arc::new(Semaphore::new(n)));
        let (shutdown, _) = watch::channel(false);

        Self {
            engine,
            config,
            limiter,
            status: Arc::new(SchedulerStatus::default()),
            ticks: AtomicU64::new(0),
            shutdown,
        }
    }

    pub fn status(&self) -> Arc<SchedulerStatus> {
        Arc::clone(&self.status)
    }

    /// Start the background loop
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            tracing::info!(
                interval = ?self.config.interval,
                max_concurrency = ?self.config.max_concurrency,
                "Scheduler started"
            );

            let mut ticker = time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                if *shutdown.borrow() {
                    break;
                }

                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = shutdown.changed() => break,
                }

                if self.config.drain_on_shutdown {
                    let _ = self.run_tick().await;
                } else {
                    tokio::select! {
                        _ = self.run_tick() => {}
                        _ = shutdown.changed() => {
                            tracing::warn!("Aborting in-flight checks");
                            break;
                        }
                    }
                }
            }

            tracing::info!("Scheduler stopped");
        })
    }

    /// Ask the loop to stop; it exits after the current tick
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Run one pass over all tracked resources and wait for every check.
    ///
    /// Only a failure to list resources fails the tick; per-resource
    /// failures are counted in the report.
    pub async fn run_tick(&self) -> Result<TickReport, StoreError> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let started = Instant::now();
        let started_at = Utc::now();

        let resources = match self.engine.store().list_all().await {
            Ok(resources) => resources,
            Err(e) => {
                self.status.ticks_failed.fetch_add(1, Ordering::SeqCst);
                tracing::error!(tick, error = %e, "Failed to list resources, skipping tick");
                return Err(e);
            }
        };

        tracing::info!(tick, resources = resources.len(), "Running price checks");
        let mut report = TickReport::new(tick, started_at, resources.len());

        let mut units = JoinSet::new();
        for resource in resources {
            let engine = Arc::clone(&self.engine);
            let limiter = self.limiter.clone();
            units.spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                engine.check(&resource).await
            });
        }

        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(outcome) => report.record(&outcome),
                Err(e) => {
                    report.aborted += 1;
                    tracing::error!(tick, error = %e, "Check task failed");
                }
            }
        }

        let elapsed = started.elapsed();
        report.elapsed_ms = elapsed.as_millis() as u64;
        if elapsed >= self.config.interval && !self.config.interval.is_zero() {
            report.coalesced_ticks = skipped_deadlines(elapsed, self.config.interval);
            tracing::warn!(
                tick,
                elapsed_ms = report.elapsed_ms,
                coalesced = report.coalesced_ticks,
                "Tick overran interval, missed ticks skipped"
            );
        }

        tracing::info!(
            tick,
            updated = report.updated,
            fetch_failed = report.fetch_failed,
            persist_failed = report.persist_failed,
            alerts = report.alerts_raised,
            elapsed_ms = report.elapsed_ms,
            "All checks complete"
        );

        self.status.record(&report);
        Ok(report)
    }
}

/// Deadlines dropped after a tick that ran for `elapsed`.
///
/// With `MissedTickBehavior::Skip` the first passed deadline still fires
/// right away; only the ones after it are lost.
fn skipped_deadlines(elapsed: Duration, interval: Duration) -> u64 {
    if interval.is_zero() {
        return 0;
    }
    let passed = (elapsed.as_nanos() / interval.as_nanos()) as u64;
    passed.saturating_sub(1)
}
