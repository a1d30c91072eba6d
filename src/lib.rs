#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # ReadySet Failover
//!
//! Health-monitored routing between a ReadySet cache and the PostgreSQL
//! database behind it.
//!
//! ## Overview
//!
//! Queries are sent to ReadySet while it is healthy. Connection failures
//! raised by ReadySet connections are counted in a sliding time window; when
//! too many happen within the window the router stops using ReadySet, drops
//! its pooled connections and falls back to the primary database. A background
//! task probes ReadySet with `SHOW READYSET STATUS` over fresh connections and
//! restores normal routing once ReadySet reports that it is connected to its
//! upstream database again.
//!
//! ## Module Organization
//!
//! - [`routing`] - The routing gate and the destinations operations run against
//! - [`resilience`] - Health monitor, error window, prober and error provenance
//! - [`database`] - sqlx backends, resettable pools and ReadySet status parsing
//! - [`config`] - YAML configuration with environment sections and overrides
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and failover event helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use readyset_failover::config::ConfigManager;
//! use readyset_failover::routing::Router;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let router = Router::from_config(manager.config())?;
//!
//! let rows = router
//!     .route_default(|db| async move { db.fetch_all("SELECT id, title FROM posts").await })
//!     .await?;
//! println!("loaded {} posts", rows.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod resilience;
pub mod routing;

pub use config::{ConfigManager, FailoverConfig, PoolConfig, ReadysetConfig};
pub use database::{DatabaseError, DatabaseErrorKind, ReadysetStatus};
pub use error::{FailoverError, Result};
pub use resilience::{HealthMetrics, HealthMonitor, HealthMonitorConfig, HealthState};
pub use routing::{Backend, Destination, Role, Router, Target};
