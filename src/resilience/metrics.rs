//! # Health Monitor Metrics
//!
//! Counters describing what the health monitor has observed and done, plus a
//! serialisable snapshot type for logging and the CLI.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Health state as reported in metrics snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Live counters, updated without locking
#[derive(Debug, Default)]
pub(crate) struct HealthCounters {
    pub(crate) exceptions_processed: AtomicU64,
    pub(crate) readyset_errors: AtomicU64,
    pub(crate) unhealthy_transitions: AtomicU64,
    pub(crate) recoveries: AtomicU64,
    pub(crate) recovery_tasks_started: AtomicU64,
    pub(crate) probes: AtomicU64,
    pub(crate) failed_probes: AtomicU64,
    pub(crate) pool_resets: AtomicU64,
}

impl HealthCounters {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, state: HealthState, errors_in_window: usize) -> HealthMetrics {
        HealthMetrics {
            current_state: state,
            errors_in_window,
            exceptions_processed: self.exceptions_processed.load(Ordering::Relaxed),
            readyset_errors: self.readyset_errors.load(Ordering::Relaxed),
            unhealthy_transitions: self.unhealthy_transitions.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
            recovery_tasks_started: self.recovery_tasks_started.load(Ordering::Relaxed),
            probes: self.probes.load(Ordering::Relaxed),
            failed_probes: self.failed_probes.load(Ordering::Relaxed),
            pool_resets: self.pool_resets.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the health monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub current_state: HealthState,
    /// ReadySet connection errors currently inside the sliding window
    pub errors_in_window: usize,
    /// Every error handed to `process_exception`
    pub exceptions_processed: u64,
    /// Errors attributed to ReadySet connectivity
    pub readyset_errors: u64,
    pub unhealthy_transitions: u64,
    pub recoveries: u64,
    pub recovery_tasks_started: u64,
    pub probes: u64,
    pub failed_probes: u64,
    pub pool_resets: u64,
}
