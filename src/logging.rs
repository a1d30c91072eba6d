//! # Structured Logging Module
//!
//! Environment-aware structured logging that outputs to both console and files,
//! plus helpers for the events operators look for when ReadySet fails over.

use chrono::Utc;
use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::resilience::HealthState;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Safe to call more than once; a global subscriber installed by someone else
/// is left in place.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = get_filter(&environment);

        let log_dir = PathBuf::from("log");
        if let Err(e) = fs::create_dir_all(&log_dir) {
            // Console output still works without the file layer
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(&filter))
                .try_init();
            tracing::warn!(error = %e, "Could not create log directory, logging to console only");
            return;
        }

        let pid = process::id();
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let log_filename = format!("readyset-failover.{environment}.{pid}.{timestamp}.log");
        let log_path = log_dir.join(&log_filename);

        let file_appender = tracing_appender::rolling::never(&log_dir, &log_filename);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(true)
                    .with_filter(EnvFilter::new(&filter)),
            )
            .with(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(EnvFilter::new(&filter)),
            );

        if subscriber.try_init().is_err() {
            // Embedded in a host that already installed a subscriber
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = pid,
            environment = %environment,
            log_file = %log_path.display(),
            "Structured logging initialized"
        );

        // The writer must outlive every log call in the process
        std::mem::forget(guard);
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("READYSET_ENV")
        .or_else(|_| std::env::var("RAILS_ENV"))
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// `RUST_LOG` wins; otherwise the level follows the environment
fn get_filter(environment: &str) -> String {
    std::env::var("RUST_LOG").unwrap_or_else(|_| get_log_level(environment).to_string())
}

fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Log a change of ReadySet health. Going unhealthy is a warning; recovery is info.
pub fn log_failover_transition(shard: &str, to: HealthState, details: &str) {
    match to {
        HealthState::Unhealthy => tracing::warn!(
            shard = %shard,
            state = ?to,
            timestamp = %Utc::now().to_rfc3339(),
            "ReadySet unhealthy: {details}"
        ),
        HealthState::Healthy => tracing::info!(
            shard = %shard,
            state = ?to,
            timestamp = %Utc::now().to_rfc3339(),
            "ReadySet healthy again: {details}"
        ),
    }
}

/// Log the outcome of a single health probe
pub fn log_probe_result(target: &str, healthy: bool, duration_ms: u64, details: Option<&str>) {
    if healthy {
        tracing::info!(
            target_name = %target,
            healthy = healthy,
            duration_ms = duration_ms,
            details = details,
            "ReadySet probe succeeded"
        );
    } else {
        tracing::warn!(
            target_name = %target,
            healthy = healthy,
            duration_ms = duration_ms,
            details = details,
            "ReadySet probe failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_helpers_do_not_require_a_subscriber() {
        log_failover_transition("readyset", HealthState::Unhealthy, "window threshold crossed");
        log_failover_transition("readyset", HealthState::Healthy, "probe succeeded");
        log_probe_result("readyset", false, 12, Some("connection refused"));
    }
}
