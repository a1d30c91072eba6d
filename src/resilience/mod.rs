//! # Resilience Module
//!
//! Health monitoring for the ReadySet connection: error attribution, the
//! sliding error window, the direct prober and the monitor that ties them
//! together.
//!
//! ## Architecture
//!
//! - **Provenance**: Marks errors raised by ReadySet connections at their root cause
//! - **Window Counter**: Counts attributed connection errors over a rolling period
//! - **Direct Prober**: Asks ReadySet for its status over a fresh connection
//! - **Health Monitor**: Owns the healthy flag, the transitions and the recovery task
//!
//! ## Usage
//!
//! ```rust,no_run
//! use readyset_failover::resilience::{HealthMonitor, HealthMonitorConfig};
//! use readyset_failover::resilience::{ConnectionPoolReset, HealthProbe};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # fn example(probe: Arc<dyn HealthProbe>, pool: Arc<dyn ConnectionPoolReset>) {
//! let monitor = HealthMonitor::new(
//!     HealthMonitorConfig {
//!         shard: "readyset".to_string(),
//!         enabled: true,
//!         error_window_size: 10,
//!         error_window_period: Duration::from_secs(60),
//!         healthcheck_interval: Duration::from_secs(5),
//!     },
//!     probe,
//!     pool,
//! );
//!
//! if monitor.healthy() {
//!     // send the query to ReadySet
//! }
//! # }
//! ```

pub mod health_monitor;
pub mod metrics;
pub mod prober;
pub mod provenance;
pub mod window_counter;

pub use health_monitor::{ConnectionPoolReset, HealthMonitor, HealthMonitorConfig};
pub use metrics::{HealthMetrics, HealthState};
pub use prober::{DirectProber, HealthProbe, ProbeTarget};
pub use provenance::{annotate_error, is_readyset_connection_error};
pub use window_counter::{Clock, SlidingWindowCounter, SystemClock};
