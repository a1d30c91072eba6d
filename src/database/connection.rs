use async_trait::async_trait;
use parking_lot::RwLock;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{Connection, Executor, PgConnection, PgPool, Row};
use std::str::FromStr;
use tokio::runtime::Handle;
use tracing::debug;

use crate::config::PoolConfig;
use crate::database::status::{StatusRow, SHOW_READYSET_STATUS};
use crate::database::{DatabaseError, DatabaseErrorKind};
use crate::resilience::provenance::annotate_error;
use crate::resilience::{ConnectionPoolReset, ProbeTarget};
use crate::routing::{Backend, Target};

/// A lazily connecting pool whose connections can all be discarded at once.
///
/// `disconnect` swaps in a brand new pool; handles cloned from the old pool
/// finish their in-flight work and the old pool is closed in the background.
/// Pools are always built on the runtime captured at construction, so
/// `disconnect` may be called from any thread.
pub struct ResettablePool {
    name: String,
    options: PgConnectOptions,
    pool_config: PoolConfig,
    runtime: Handle,
    pool: RwLock<PgPool>,
}

impl ResettablePool {
    /// Build the pool without connecting. Must be called inside a Tokio runtime.
    pub fn connect_lazy(
        name: impl Into<String>,
        url: &str,
        pool_config: &PoolConfig,
    ) -> Result<Self, DatabaseError> {
        let options = PgConnectOptions::from_str(url)?;
        let runtime = Handle::try_current().map_err(|e| {
            DatabaseError::new(
                DatabaseErrorKind::Other,
                format!("connection pools must be created inside a Tokio runtime: {e}"),
            )
        })?;
        let pool = Self::build_pool(&options, pool_config);

        Ok(Self {
            name: name.into(),
            options,
            pool_config: pool_config.clone(),
            runtime,
            pool: RwLock::new(pool),
        })
    }

    fn build_pool(options: &PgConnectOptions, pool_config: &PoolConfig) -> PgPool {
        PgPoolOptions::new()
            .max_connections(pool_config.max_connections)
            .acquire_timeout(pool_config.acquire_timeout())
            .connect_lazy_with(options.clone())
    }

    /// Handle to the pool currently in use
    pub fn current(&self) -> PgPool {
        self.pool.read().clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ConnectionPoolReset for ResettablePool {
    fn disconnect(&self) {
        // sqlx spawns pool maintenance tasks on the current runtime
        let fresh = {
            let _runtime = self.runtime.enter();
            Self::build_pool(&self.options, &self.pool_config)
        };
        let stale = std::mem::replace(&mut *self.pool.write(), fresh);

        self.runtime.spawn(async move { stale.close().await });

        debug!(pool = %self.name, "Discarded pooled connections");
    }
}

impl std::fmt::Debug for ResettablePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResettablePool")
            .field("name", &self.name)
            .field("max_connections", &self.pool_config.max_connections)
            .finish()
    }
}

/// sqlx-backed [`Backend`]. Errors from a ReadySet backend carry the
/// ReadySet provenance mark; errors from the primary never do.
#[derive(Debug)]
pub struct PgBackend {
    target: Target,
    pool: std::sync::Arc<ResettablePool>,
}

impl PgBackend {
    pub fn new(target: Target, pool: std::sync::Arc<ResettablePool>) -> Self {
        Self { target, pool }
    }

    fn map_error(&self, err: sqlx::Error) -> DatabaseError {
        let err = DatabaseError::from(err);
        if self.target == Target::Readyset {
            annotate_error(&err);
        }
        err
    }
}

#[async_trait]
impl Backend for PgBackend {
    type Row = PgRow;

    fn target(&self) -> Target {
        self.target
    }

    async fn execute(&self, statement: &str) -> Result<u64, DatabaseError> {
        let pool = self.pool.current();
        sqlx::raw_sql(statement)
            .execute(&pool)
            .await
            .map(|result| result.rows_affected())
            .map_err(|e| self.map_error(e))
    }

    async fn fetch_all(&self, statement: &str) -> Result<Vec<PgRow>, DatabaseError> {
        let pool = self.pool.current();
        sqlx::raw_sql(statement)
            .fetch_all(&pool)
            .await
            .map_err(|e| self.map_error(e))
    }
}

/// Runs `SHOW READYSET STATUS` over a connection opened for that single call
#[derive(Debug, Clone)]
pub struct PgProbeTarget {
    options: PgConnectOptions,
}

impl PgProbeTarget {
    pub fn new(options: PgConnectOptions) -> Self {
        Self { options }
    }

    pub fn from_url(url: &str) -> Result<Self, DatabaseError> {
        Ok(Self::new(PgConnectOptions::from_str(url)?))
    }
}

fn readyset_error(err: sqlx::Error) -> DatabaseError {
    let err = DatabaseError::from(err);
    annotate_error(&err);
    err
}

#[async_trait]
impl ProbeTarget for PgProbeTarget {
    async fn fetch_status(&self) -> Result<Vec<StatusRow>, DatabaseError> {
        let mut conn = PgConnection::connect_with(&self.options)
            .await
            .map_err(readyset_error)?;

        let rows = conn
            .fetch_all(sqlx::raw_sql(SHOW_READYSET_STATUS))
            .await
            .map_err(readyset_error);

        // The connection is never reused, so a failed close changes nothing
        if let Err(e) = conn.close().await {
            debug!(error = %e, "Failed to close probe connection cleanly");
        }

        rows?
            .iter()
            .map(|row| -> Result<StatusRow, sqlx::Error> {
                Ok(StatusRow {
                    name: row.try_get("name")?,
                    value: row.try_get("value")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(readyset_error)
    }
}
