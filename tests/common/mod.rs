//! Shared fakes for driving the router and health monitor without a database

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use readyset_failover::database::{DatabaseError, DatabaseErrorKind};
use readyset_failover::resilience::{
    annotate_error, ConnectionPoolReset, HealthMonitor, HealthMonitorConfig, HealthProbe,
};
use readyset_failover::routing::{Backend, Router, Target};

pub const WINDOW_SIZE: usize = 3;
pub const HEALTHCHECK_INTERVAL: Duration = Duration::from_millis(100);

/// How a [`MemoryBackend`] answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Ok,
    /// Connection failures; errors from a ReadySet backend are marked as such
    ConnectionLost,
    /// Connection failures that never carry the ReadySet mark
    UnmarkedConnectionLost,
    /// Query failures, marked like connection failures
    QueryError,
}

/// In-memory backend that records every statement it receives
pub struct MemoryBackend {
    target: Target,
    mode: parking_lot::Mutex<Mode>,
    statements: parking_lot::Mutex<Vec<String>>,
}

impl MemoryBackend {
    pub fn new(target: Target) -> Arc<Self> {
        Arc::new(Self {
            target,
            mode: parking_lot::Mutex::new(Mode::Ok),
            statements: parking_lot::Mutex::new(Vec::new()),
        })
    }

    pub fn set_mode(&self, mode: Mode) {
        *self.mode.lock() = mode;
    }

    pub fn calls(&self) -> usize {
        self.statements.lock().len()
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    fn respond(&self, statement: &str) -> Result<(), DatabaseError> {
        self.statements.lock().push(statement.to_string());
        let mode = *self.mode.lock();
        let err = match mode {
            Mode::Ok => return Ok(()),
            Mode::ConnectionLost | Mode::UnmarkedConnectionLost => DatabaseError::new(
                DatabaseErrorKind::ConnectionBad,
                "server closed the connection unexpectedly",
            ),
            Mode::QueryError => DatabaseError::new(
                DatabaseErrorKind::Query,
                "relation \"missing\" does not exist",
            )
            .with_code("42P01"),
        };
        if self.target == Target::Readyset && mode != Mode::UnmarkedConnectionLost {
            annotate_error(&err);
        }
        Err(err)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    type Row = (Target, String);

    fn target(&self) -> Target {
        self.target
    }

    async fn execute(&self, statement: &str) -> Result<u64, DatabaseError> {
        self.respond(statement)?;
        Ok(1)
    }

    async fn fetch_all(&self, statement: &str) -> Result<Vec<(Target, String)>, DatabaseError> {
        self.respond(statement)?;
        Ok(vec![(self.target, statement.to_string())])
    }
}

/// Probe whose answer the test controls
#[derive(Default)]
pub struct SwitchProbe {
    healthy: AtomicBool,
    calls: AtomicUsize,
}

impl SwitchProbe {
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for SwitchProbe {
    async fn healthy(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.healthy.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct CountingPool {
    disconnects: AtomicUsize,
}

impl CountingPool {
    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

impl ConnectionPoolReset for CountingPool {
    fn disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub router: Router<MemoryBackend>,
    pub readyset: Arc<MemoryBackend>,
    pub primary: Arc<MemoryBackend>,
    pub probe: Arc<SwitchProbe>,
    pub pool: Arc<CountingPool>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_interval(HEALTHCHECK_INTERVAL)
    }

    pub fn with_interval(healthcheck_interval: Duration) -> Self {
        let probe = Arc::new(SwitchProbe::default());
        let pool = Arc::new(CountingPool::default());
        let monitor = HealthMonitor::new(
            HealthMonitorConfig {
                shard: "readyset".to_string(),
                enabled: true,
                error_window_size: WINDOW_SIZE,
                error_window_period: Duration::from_secs(30),
                healthcheck_interval,
            },
            probe.clone(),
            pool.clone(),
        );
        let readyset = MemoryBackend::new(Target::Readyset);
        let primary = MemoryBackend::new(Target::Primary);

        Self {
            router: Router::new(monitor, readyset.clone(), primary.clone()),
            readyset,
            primary,
            probe,
            pool,
        }
    }

    pub fn monitor(&self) -> &HealthMonitor {
        self.router.monitor()
    }

    /// Route a read through the gate and return where it was answered
    pub async fn read(&self, statement: &str) -> readyset_failover::Result<Target> {
        let statement = statement.to_string();
        let rows = self
            .router
            .route_default(|db| async move { db.fetch_all(&statement).await })
            .await?;
        Ok(rows[0].0)
    }
}
