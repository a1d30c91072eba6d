//! # Direct Prober
//!
//! Active, side-effect-free health check against ReadySet. Every probe asks a
//! [`ProbeTarget`] for `SHOW READYSET STATUS` over a connection made for that
//! probe alone, so a socket that went stale during an outage can never report
//! a misleading result. Each probe is bounded by a timeout; errors and
//! timeouts count as "not healthy" and never propagate.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::database::status::{is_upstream_connected, StatusRow};
use crate::database::DatabaseError;

/// Source of ReadySet status rows.
///
/// Implementations must not reuse connection state between calls: each call
/// either opens a fresh connection or resets an existing one before use.
#[async_trait]
pub trait ProbeTarget: Send + Sync {
    async fn fetch_status(&self) -> Result<Vec<StatusRow>, DatabaseError>;
}

/// A health check the recovery task can run on each tick
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn healthy(&self) -> bool;
}

#[derive(Debug)]
pub struct DirectProber<T> {
    target: T,
    timeout: Duration,
}

impl<T: ProbeTarget> DirectProber<T> {
    pub fn new(target: T, timeout: Duration) -> Self {
        Self { target, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<T: ProbeTarget> HealthProbe for DirectProber<T> {
    async fn healthy(&self) -> bool {
        match tokio::time::timeout(self.timeout, self.target.fetch_status()).await {
            Ok(Ok(rows)) => {
                let connected = is_upstream_connected(&rows);
                if !connected {
                    debug!("ReadySet still unhealthy: not connected to upstream database");
                }
                connected
            }
            Ok(Err(e)) => {
                debug!(error = %e, "ReadySet still unhealthy");
                false
            }
            Err(_) => {
                debug!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    "ReadySet still unhealthy: health probe timed out"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::status::{CONNECTED, DATABASE_CONNECTION};
    use crate::database::DatabaseErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Response {
        Rows(Vec<StatusRow>),
        Fail,
        Hang,
    }

    struct StubTarget {
        response: Response,
        calls: AtomicUsize,
    }

    impl StubTarget {
        fn new(response: Response) -> Self {
            Self {
                response,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProbeTarget for StubTarget {
        async fn fetch_status(&self) -> Result<Vec<StatusRow>, DatabaseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Response::Rows(rows) => Ok(rows.clone()),
                Response::Fail => Err(DatabaseError::new(
                    DatabaseErrorKind::ConnectionBad,
                    "could not connect to server",
                )),
                Response::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(Vec::new())
                }
            }
        }
    }

    fn prober(response: Response) -> DirectProber<StubTarget> {
        DirectProber::new(StubTarget::new(response), Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_connected_status_is_healthy() {
        let prober = prober(Response::Rows(vec![
            StatusRow::new("Connection Count", "2"),
            StatusRow::new(DATABASE_CONNECTION, CONNECTED),
        ]));

        assert!(prober.healthy().await);
    }

    #[tokio::test]
    async fn test_disconnected_status_is_unhealthy() {
        let prober = prober(Response::Rows(vec![StatusRow::new(
            DATABASE_CONNECTION,
            "Not Connected",
        )]));

        assert!(!prober.healthy().await);
    }

    #[tokio::test]
    async fn test_probe_errors_are_swallowed() {
        let prober = prober(Response::Fail);

        assert!(!prober.healthy().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_probe_times_out() {
        let prober = prober(Response::Hang);

        assert!(!prober.healthy().await);
    }

    #[tokio::test]
    async fn test_every_probe_queries_the_target() {
        let prober = prober(Response::Rows(vec![StatusRow::new(DATABASE_CONNECTION, CONNECTED)]));

        for _ in 0..3 {
            prober.healthy().await;
        }

        assert_eq!(prober.target.calls.load(Ordering::SeqCst), 3);
    }
}
