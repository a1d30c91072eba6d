use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::config::ReadysetConfig;
use crate::database::{PgBackend, PgProbeTarget, ResettablePool};
use crate::error::Result;
use crate::resilience::{DirectProber, HealthMonitor, HealthMonitorConfig};
use crate::routing::{Backend, Destination, Role, Target};

/// Sends operations to ReadySet while it is healthy and to the primary
/// database while it is not
pub struct Router<B> {
    monitor: HealthMonitor,
    readyset: Arc<B>,
    primary: Arc<B>,
}

impl<B: Backend> Router<B> {
    pub fn new(monitor: HealthMonitor, readyset: Arc<B>, primary: Arc<B>) -> Self {
        Self {
            monitor,
            readyset,
            primary,
        }
    }

    pub fn monitor(&self) -> &HealthMonitor {
        &self.monitor
    }

    /// Run `operation` against ReadySet if healthy, otherwise against the
    /// primary database.
    ///
    /// On the ReadySet path the destination is read-only when
    /// `prevent_writes` is set, and any error other than a rejected write is
    /// reported to the health monitor. Errors are always returned unchanged.
    pub async fn route<F, Fut, T>(&self, prevent_writes: bool, operation: F) -> Result<T>
    where
        F: FnOnce(Destination<B>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.monitor.healthy() {
            debug!(shard = %self.monitor.shard(), "ReadySet unhealthy, routing to primary");
            return operation(Destination::new(Arc::clone(&self.primary), Role::Writing)).await;
        }

        let role = if prevent_writes {
            Role::Reading
        } else {
            Role::Writing
        };

        let result = operation(Destination::new(Arc::clone(&self.readyset), role)).await;
        if let Err(e) = &result {
            if !e.is_write_rejected() {
                self.monitor.process_exception(e);
            }
        }
        result
    }

    /// [`Router::route`] with writes prevented
    pub async fn route_default<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Destination<B>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.route(true, operation).await
    }
}

impl Router<PgBackend> {
    /// Wire up pools, prober and monitor for a validated configuration.
    /// Must be called inside a Tokio runtime; no connection is opened here.
    pub fn from_config(config: &ReadysetConfig) -> Result<Self> {
        config.validate()?;
        let readyset_url = config.readyset_url()?;
        let primary_url = config.primary_url()?;

        let readyset_pool = Arc::new(ResettablePool::connect_lazy(
            config.shard.clone(),
            readyset_url,
            &config.pool,
        )?);
        let primary_pool = Arc::new(ResettablePool::connect_lazy(
            "primary",
            primary_url,
            &config.pool,
        )?);

        let prober = DirectProber::new(
            PgProbeTarget::from_url(readyset_url)?,
            config.failover.probe_timeout(),
        );
        let monitor = HealthMonitor::new(
            HealthMonitorConfig::from_config(config),
            Arc::new(prober),
            readyset_pool.clone(),
        );

        Ok(Self::new(
            monitor,
            Arc::new(PgBackend::new(Target::Readyset, readyset_pool)),
            Arc::new(PgBackend::new(Target::Primary, primary_pool)),
        ))
    }
}

impl<B> std::fmt::Debug for Router<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("monitor", &self.monitor)
            .finish()
    }
}
