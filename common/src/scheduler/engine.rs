// Scheduler engine implementation

use super::due::due_monitors;
use super::flight::{FlightGuard, InFlight};
use crate::config::SchedulerSettings;
use crate::db::MonitorStore;
use crate::detector::ChangeDetector;
use crate::errors::PersistenceError;
use crate::models::Monitor;
use crate::notifier::Notifier;
use crate::reaper::ExpiryReaper;
use crate::telemetry::{self, CheckOutcome};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

/// Configuration for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Fixed tick period; must be finer than the shortest monitor interval
    pub tick: Duration,
    /// How often expired monitors are swept
    pub cleanup_interval: Duration,
    /// Upper bound on a single monitor check
    pub check_timeout: Duration,
    /// Maximum number of checks running at once
    pub max_concurrent_checks: usize,
    /// Pause after a failed tick before trying again
    pub error_backoff: Duration,
    /// How long shutdown waits for in-flight checks before aborting them
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(30),
            cleanup_interval: Duration::from_secs(3600),
            check_timeout: Duration::from_secs(20),
            max_concurrent_checks: 8,
            error_backoff: Duration::from_secs(60),
            shutdown_grace: Duration::from_secs(30),
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            tick: Duration::from_secs(settings.tick_seconds),
            cleanup_interval: Duration::from_secs(settings.cleanup_interval_seconds),
            check_timeout: Duration::from_secs(settings.check_timeout_seconds),
            max_concurrent_checks: settings.max_concurrent_checks.max(1),
            error_backoff: Duration::from_secs(settings.error_backoff_seconds),
            shutdown_grace: Duration::from_secs(settings.shutdown_grace_seconds),
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub active: usize,
    pub due: usize,
    pub dispatched: usize,
    pub skipped_in_flight: usize,
    pub reaped: u64,
}

/// Scheduler trait for monitor polling operations
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Run the tick loop until `stop` is called
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Ask the loop to stop; in-flight checks are allowed to finish
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Run a single tick at `now` and dispatch due checks
    async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickSummary, PersistenceError>;
}

/// Everything a spawned check needs; cheap to clone into each task
#[derive(Clone)]
struct CheckContext {
    store: Arc<dyn MonitorStore>,
    detector: ChangeDetector,
    notifier: Notifier,
    check_timeout: Duration,
}

impl CheckContext {
    #[instrument(skip(self, monitor, _guard), fields(monitor_id = monitor.id, interval = monitor.interval.minutes()))]
    async fn run(&self, monitor: Monitor, now: DateTime<Utc>, _guard: FlightGuard) -> CheckOutcome {
        let started = Instant::now();

        let outcome = match timeout(self.check_timeout, self.detector.check(&monitor)).await {
            Err(_) => {
                warn!(
                    timeout_seconds = self.check_timeout.as_secs(),
                    "Monitor check timed out, state left unchanged"
                );
                CheckOutcome::Timeout
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Fetch failed, state left unchanged");
                CheckOutcome::FetchError
            }
            Ok(Ok(changes)) => {
                if changes.has_new_records() {
                    telemetry::record_new_records(changes.new_records.len());
                    info!(new_records = changes.new_records.len(), "New records found");
                }

                for record in &changes.new_records {
                    if let Err(e) = self.notifier.dispatch(monitor.destination_id, record).await {
                        // Not retried; the record stays known
                        error!(
                            record_id = %record.id,
                            destination_id = monitor.destination_id,
                            error = %e,
                            "Failed to deliver notification"
                        );
                    }
                }

                match self
                    .store
                    .record_check(monitor.id, now, &changes.known_ids)
                    .await
                {
                    Ok(true) => CheckOutcome::Success,
                    Ok(false) => {
                        warn!("Check result not stored: monitor missing or a newer check exists");
                        CheckOutcome::Stale
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to record check");
                        CheckOutcome::PersistError
                    }
                }
            }
        };

        telemetry::record_check(outcome, started.elapsed().as_secs_f64());
        outcome
    }
}

/// Main scheduler engine implementation
pub struct SchedulerEngine {
    config: SchedulerConfig,
    context: CheckContext,
    reaper: ExpiryReaper,
    in_flight: InFlight,
    permits: Arc<Semaphore>,
    tasks: Mutex<JoinSet<CheckOutcome>>,
    last_cleanup: Mutex<Option<DateTime<Utc>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl SchedulerEngine {
    /// Create a new scheduler engine
    pub fn new(
        config: SchedulerConfig,
        store: Arc<dyn MonitorStore>,
        detector: ChangeDetector,
        notifier: Notifier,
        reaper: ExpiryReaper,
    ) -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        let permits = Arc::new(Semaphore::new(config.max_concurrent_checks.max(1)));

        Self {
            context: CheckContext {
                store,
                detector,
                notifier,
                check_timeout: config.check_timeout,
            },
            config,
            reaper,
            in_flight: InFlight::new(),
            permits,
            tasks: Mutex::new(JoinSet::new()),
            last_cleanup: Mutex::new(None),
            shutdown_tx,
        }
    }

    /// Get a shutdown signal receiver
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_stopping(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Ids with a check currently running or waiting for a worker slot
    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    /// Wait for every dispatched check to finish and return their outcomes
    pub async fn wait_idle(&self) -> Vec<CheckOutcome> {
        let mut tasks = self.tasks.lock().await;
        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) if e.is_panic() => error!(error = %e, "Monitor check panicked"),
                Err(_) => {}
            }
        }
        outcomes
    }

    /// Collect results of checks that already finished without waiting
    async fn reap_finished(&self) {
        let mut tasks = self.tasks.lock().await;
        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                if e.is_panic() {
                    error!(error = %e, "Monitor check panicked");
                }
            }
        }
    }

    async fn maybe_sweep(&self, now: DateTime<Utc>) -> u64 {
        let mut last_cleanup = self.last_cleanup.lock().await;
        let cleanup_interval = chrono::Duration::from_std(self.config.cleanup_interval)
            .unwrap_or_else(|_| chrono::Duration::days(365));
        let due = match *last_cleanup {
            None => true,
            Some(last) => now.signed_duration_since(last) >= cleanup_interval,
        };
        if !due {
            return 0;
        }

        match self.reaper.sweep(now).await {
            Ok(count) => {
                *last_cleanup = Some(now);
                count
            }
            Err(e) => {
                // Retried on the next tick
                error!(error = %e, "Failed to clean up expired monitors");
                0
            }
        }
    }

    /// Finish in-flight checks within the grace period, then abort the rest
    async fn drain(&self) {
        let in_flight = self.in_flight.len();
        if in_flight > 0 {
            info!(in_flight = in_flight, "Waiting for in-flight checks");
        }

        if timeout(self.config.shutdown_grace, self.wait_idle()).await.is_err() {
            warn!(
                grace_seconds = self.config.shutdown_grace.as_secs(),
                "In-flight checks did not finish in time, aborting"
            );
            self.tasks.lock().await.abort_all();
            self.wait_idle().await;
        }
    }
}

#[async_trait]
impl Scheduler for SchedulerEngine {
    #[instrument(skip(self))]
    async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            tick_seconds = self.config.tick.as_secs(),
            max_concurrent_checks = self.config.max_concurrent_checks,
            "Starting scheduler engine"
        );

        let mut shutdown_rx = self.shutdown_receiver();

        while !*shutdown_rx.borrow() {
            let started = Instant::now();

            // A panic inside the tick must not end the loop
            let tick = AssertUnwindSafe(self.run_tick(Utc::now())).catch_unwind().await;
            let delay = match tick {
                Ok(Ok(summary)) => {
                    if summary.dispatched > 0 {
                        info!(
                            active = summary.active,
                            due = summary.due,
                            dispatched = summary.dispatched,
                            "Dispatched due monitors"
                        );
                    } else {
                        debug!(active = summary.active, "No monitors due");
                    }
                    self.config.tick.saturating_sub(started.elapsed())
                }
                Ok(Err(e)) => {
                    error!(error = %e, "Error in monitor tick, backing off");
                    self.config.error_backoff
                }
                Err(_) => {
                    error!("Monitor tick panicked, backing off");
                    self.config.error_backoff
                }
            };

            tokio::select! {
                _ = sleep(delay) => {}
                _ = shutdown_rx.changed() => {}
            }
        }

        info!("Shutdown signal received, draining scheduler");
        self.drain().await;
        info!("Scheduler engine stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Stopping scheduler engine");
        self.shutdown_tx.send_replace(true);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn run_tick(&self, now: DateTime<Utc>) -> Result<TickSummary, PersistenceError> {
        self.reap_finished().await;

        let mut summary = TickSummary {
            reaped: self.maybe_sweep(now).await,
            ..TickSummary::default()
        };

        let monitors = self.context.store.list_all_active().await?;
        telemetry::update_active_monitors(monitors.len());
        summary.active = monitors.len();

        let due = due_monitors(now, &monitors);
        summary.due = due.len();

        let mut tasks = self.tasks.lock().await;
        for monitor in due {
            if self.is_stopping() {
                debug!("Shutdown requested, not dispatching further checks");
                break;
            }

            let Some(guard) = self.in_flight.try_claim(monitor.id) else {
                debug!(monitor_id = monitor.id, "Check already in flight, skipping");
                summary.skipped_in_flight += 1;
                continue;
            };

            let context = self.context.clone();
            let permits = Arc::clone(&self.permits);
            let shutdown_rx = self.shutdown_receiver();
            tasks.spawn(async move {
                // The semaphore is never closed
                let Ok(_permit) = permits.acquire_owned().await else {
                    return CheckOutcome::Cancelled;
                };
                // Only checks that already hold a worker may finish after stop
                if *shutdown_rx.borrow() {
                    debug!(monitor_id = monitor.id, "Shutdown requested, dropping queued check");
                    telemetry::record_check(CheckOutcome::Cancelled, 0.0);
                    return CheckOutcome::Cancelled;
                }
                context.run(monitor, now, guard).await
            });
            summary.dispatched += 1;
        }

        Ok(summary)
    }
}
