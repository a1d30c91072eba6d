//! # Sliding Window Counter
//!
//! Keeps track of events over time to tell whether more than `window_size`
//! events happened within the last `time_period`. With a window size of 10
//! and a period of one minute, the eleventh event inside a minute crosses the
//! threshold.
//!
//! Stale entries are evicted lazily on every access, measured against the
//! clock at the time of the call.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of the current time for a [`SlidingWindowCounter`]
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Monotonic system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Thread-safe count of events inside a rolling time period
#[derive(Debug)]
pub struct SlidingWindowCounter {
    times: Mutex<VecDeque<Instant>>,
    window_size: usize,
    time_period: Duration,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowCounter {
    pub const DEFAULT_WINDOW_SIZE: usize = 10;
    pub const DEFAULT_TIME_PERIOD: Duration = Duration::from_secs(60);

    pub fn new(window_size: usize, time_period: Duration) -> Self {
        Self::with_clock(window_size, time_period, Arc::new(SystemClock))
    }

    pub fn with_clock(window_size: usize, time_period: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            times: Mutex::new(VecDeque::new()),
            window_size,
            time_period,
            clock,
        }
    }

    /// Record an event at the current time
    pub fn log(&self) {
        let now = self.clock.now();
        let mut times = self.times.lock();
        Self::evict(&mut times, now, self.time_period);
        times.push_back(now);
    }

    /// Number of events inside the period
    pub fn size(&self) -> usize {
        let now = self.clock.now();
        let mut times = self.times.lock();
        Self::evict(&mut times, now, self.time_period);
        times.len()
    }

    /// True only when strictly more than `window_size` events fall inside the period
    pub fn threshold_crossed(&self) -> bool {
        let now = self.clock.now();
        let mut times = self.times.lock();
        Self::evict(&mut times, now, self.time_period);
        times.len() > self.window_size
    }

    /// Forget every event
    pub fn clear(&self) {
        self.times.lock().clear();
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn time_period(&self) -> Duration {
        self.time_period
    }

    // Entries are appended in time order, so stale ones are always at the front.
    fn evict(times: &mut VecDeque<Instant>, now: Instant, time_period: Duration) {
        while let Some(&oldest) = times.front() {
            if now.saturating_duration_since(oldest) > time_period {
                times.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for SlidingWindowCounter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW_SIZE, Self::DEFAULT_TIME_PERIOD)
    }
}

/// Manually advanced clock for deterministic tests
#[cfg(test)]
#[derive(Debug)]
pub(crate) struct ManualClock {
    now: Mutex<Instant>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}
