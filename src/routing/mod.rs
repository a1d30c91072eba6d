//! # Routing Gate
//!
//! Public entry point for queries. [`Router::route`] hands the caller's
//! operation a [`Destination`] on ReadySet while the health monitor reports
//! healthy, and on the primary database otherwise. Failures on the ReadySet
//! path are reported to the monitor and then returned to the caller unchanged.

pub mod destination;
pub mod router;

pub use destination::{is_read_statement, is_write_statement, Backend, Destination, Role, Target};
pub use router::Router;
