//! # Health Monitor
//!
//! Decides whether queries may go to ReadySet. Errors reported through
//! [`HealthMonitor::process_exception`] that trace back to a ReadySet
//! connection failure are counted in a sliding window; once the window's
//! threshold is crossed the monitor turns unhealthy, discards the ReadySet
//! connection pool and starts a background recovery task. The task probes
//! ReadySet directly on a fixed interval and restores the healthy state once
//! a probe succeeds.
//!
//! ## State Transitions
//!
//! ```text
//! Healthy → Unhealthy: threshold crossed in process_exception (exactly one caller wins)
//! Unhealthy → Healthy: a recovery probe succeeds (only inside the recovery task)
//! ```

use futures::FutureExt;
use parking_lot::Mutex;
use std::error::Error;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

use crate::config::ReadysetConfig;
use crate::logging::log_failover_transition;
use crate::resilience::metrics::{HealthCounters, HealthMetrics, HealthState};
use crate::resilience::provenance::is_readyset_connection_error;
use crate::resilience::{HealthProbe, SlidingWindowCounter};

/// Discards every pooled connection of the monitored shard so the next use
/// establishes a fresh socket
pub trait ConnectionPoolReset: Send + Sync {
    fn disconnect(&self);
}

/// Settings consumed by [`HealthMonitor`] at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthMonitorConfig {
    /// Logical shard the ReadySet connections belong to
    pub shard: String,
    /// When false the monitor never leaves the healthy state
    pub enabled: bool,
    pub error_window_size: usize,
    pub error_window_period: Duration,
    pub healthcheck_interval: Duration,
}

impl HealthMonitorConfig {
    pub fn from_config(config: &ReadysetConfig) -> Self {
        Self {
            shard: config.shard.clone(),
            enabled: config.failover.enabled,
            error_window_size: config.failover.error_window_size,
            error_window_period: config.failover.error_window_period(),
            healthcheck_interval: config.failover.healthcheck_interval(),
        }
    }
}

/// Cheaply cloneable handle to one shard's health state
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<Inner>,
}

struct Inner {
    shard: String,
    enabled: bool,
    healthcheck_interval: Duration,
    healthy: AtomicBool,
    /// Guards every write to `healthy`
    lock: Mutex<()>,
    window_counter: SlidingWindowCounter,
    probe: Arc<dyn HealthProbe>,
    pool: Arc<dyn ConnectionPoolReset>,
    /// Runtime the recovery task is spawned on, captured at construction
    runtime: Option<Handle>,
    /// The live recovery task; emptied by the task itself on recovery
    recovery_task: Mutex<Option<JoinHandle<()>>>,
    counters: HealthCounters,
}

impl HealthMonitor {
    pub fn new(
        config: HealthMonitorConfig,
        probe: Arc<dyn HealthProbe>,
        pool: Arc<dyn ConnectionPoolReset>,
    ) -> Self {
        let window_counter =
            SlidingWindowCounter::new(config.error_window_size, config.error_window_period);
        Self::with_window_counter(config, window_counter, probe, pool)
    }

    /// Build with a caller-supplied window counter (e.g. one with a custom clock).
    ///
    /// When built inside a Tokio runtime, the recovery task always runs on
    /// that runtime, so errors may be reported from any thread. Otherwise the
    /// task is started on whichever runtime reports an error first.
    pub fn with_window_counter(
        config: HealthMonitorConfig,
        window_counter: SlidingWindowCounter,
        probe: Arc<dyn HealthProbe>,
        pool: Arc<dyn ConnectionPoolReset>,
    ) -> Self {
        debug!(
            shard = %config.shard,
            enabled = config.enabled,
            error_window_size = window_counter.window_size(),
            error_window_period_secs = window_counter.time_period().as_secs(),
            healthcheck_interval_ms = config.healthcheck_interval.as_millis() as u64,
            "Health monitor initialized"
        );

        Self {
            inner: Arc::new(Inner {
                shard: config.shard,
                enabled: config.enabled,
                healthcheck_interval: config.healthcheck_interval,
                healthy: AtomicBool::new(true),
                lock: Mutex::new(()),
                window_counter,
                probe,
                pool,
                runtime: Handle::try_current().ok(),
                recovery_task: Mutex::new(None),
                counters: HealthCounters::default(),
            }),
        }
    }

    /// Whether queries may currently be sent to ReadySet. Lock-free.
    pub fn healthy(&self) -> bool {
        self.inner.healthy.load(Ordering::Acquire)
    }

    pub fn state(&self) -> HealthState {
        if self.healthy() {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        }
    }

    pub fn shard(&self) -> &str {
        &self.inner.shard
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Record `exception` if it is a ReadySet connection failure and turn
    /// unhealthy once the error window's threshold is crossed.
    ///
    /// Never fails and never re-raises; the caller decides what to do with
    /// the error afterwards.
    pub fn process_exception(&self, exception: &(dyn Error + 'static)) {
        let inner = &self.inner;
        if !inner.enabled {
            return;
        }

        HealthCounters::incr(&inner.counters.exceptions_processed);
        if is_readyset_connection_error(exception) {
            HealthCounters::incr(&inner.counters.readyset_errors);
            inner.window_counter.log();
        }

        let became_unhealthy = {
            let _guard = inner.lock.lock();
            if inner.healthy.load(Ordering::Acquire) && inner.window_counter.threshold_crossed() {
                inner.healthy.store(false, Ordering::Release);
                HealthCounters::incr(&inner.counters.unhealthy_transitions);
                inner.reset_pool();
                true
            } else {
                false
            }
        };

        if became_unhealthy {
            log_failover_transition(
                &inner.shard,
                HealthState::Unhealthy,
                "Routing queries to the primary database until ReadySet becomes healthy again",
            );
        }
        // Also retries a start that failed earlier for lack of a runtime
        if !inner.healthy.load(Ordering::Acquire) {
            self.ensure_recovery_task();
        }
    }

    /// Start the recovery task unless one is already live or ReadySet has
    /// recovered in the meantime
    fn ensure_recovery_task(&self) {
        let mut slot = self.inner.recovery_task.lock();
        // The recovery task flips the flag while holding the slot
        if self.healthy() || slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let Some(handle) = self
            .inner
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
        else {
            error!(
                shard = %self.inner.shard,
                "Cannot start ReadySet recovery task outside a Tokio runtime; retrying on the next reported error"
            );
            return;
        };

        HealthCounters::incr(&self.inner.counters.recovery_tasks_started);
        *slot = Some(handle.spawn(run_recovery(
            Arc::downgrade(&self.inner),
            self.inner.healthcheck_interval,
        )));
    }

    pub fn is_recovery_task_running(&self) -> bool {
        self.inner
            .recovery_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop a running recovery task; the monitor stays in its current state
    pub fn shutdown(&self) {
        if let Some(task) = self.inner.recovery_task.lock().take() {
            task.abort();
            debug!(shard = %self.inner.shard, "Recovery task stopped");
        }
    }

    /// Number of ReadySet connection errors inside the current window
    pub fn errors_in_window(&self) -> usize {
        self.inner.window_counter.size()
    }

    pub fn metrics(&self) -> HealthMetrics {
        self.inner
            .counters
            .snapshot(self.state(), self.inner.window_counter.size())
    }
}

impl fmt::Debug for HealthMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthMonitor")
            .field("shard", &self.inner.shard)
            .field("enabled", &self.inner.enabled)
            .field("healthy", &self.healthy())
            .field("window_counter", &self.inner.window_counter)
            .finish()
    }
}

impl Inner {
    fn reset_pool(&self) {
        self.pool.disconnect();
        HealthCounters::incr(&self.counters.pool_resets);
    }

    /// One recovery tick. Returns true once ReadySet is healthy again.
    async fn check_recovered(&self) -> bool {
        HealthCounters::incr(&self.counters.probes);
        let healthy = AssertUnwindSafe(self.probe.healthy())
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                error!(shard = %self.shard, "ReadySet health probe panicked");
                false
            });
        if !healthy {
            HealthCounters::incr(&self.counters.failed_probes);
            return false;
        }

        // Connections opened before the outage can keep failing after ReadySet
        // is back, so traffic only resumes on fresh ones.
        self.reset_pool();

        // Holding the task slot keeps a concurrent transition from seeing this
        // task as live after it has decided to exit.
        let mut slot = self.recovery_task.lock();
        {
            let _guard = self.lock.lock();
            self.healthy.store(true, Ordering::Release);
        }
        HealthCounters::incr(&self.counters.recoveries);
        self.window_counter.clear();
        *slot = None;
        drop(slot);

        log_failover_transition(&self.shard, HealthState::Healthy, "health probe succeeded");
        true
    }
}

/// Probe every `interval` until ReadySet recovers or the monitor is dropped.
/// Ticks run one at a time; a tick that overruns the interval skips the
/// ticks it missed.
async fn run_recovery(inner: Weak<Inner>, interval: Duration) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if inner.check_recovered().await {
            return;
        }
    }
}
