//! End-to-end failover behaviour: router, health monitor and recovery task
//! working together against in-memory backends

mod common;

use common::{Harness, Mode, HEALTHCHECK_INTERVAL, WINDOW_SIZE};
use readyset_failover::error::FailoverError;
use readyset_failover::routing::{Role, Target};
use readyset_failover::HealthState;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

async fn trip(harness: &Harness) {
    harness.readyset.set_mode(Mode::ConnectionLost);
    for _ in 0..=WINDOW_SIZE {
        assert_err!(harness.read("SELECT * FROM posts").await);
    }
}

#[tokio::test(start_paused = true)]
async fn readyset_outage_fails_over_and_recovers() {
    let harness = Harness::new();
    assert_eq!(assert_ok!(harness.read("SELECT 1").await), Target::Readyset);

    trip(&harness).await;
    assert!(!harness.monitor().healthy());
    assert_eq!(harness.pool.disconnects(), 1);

    // Served by the primary while ReadySet is out
    let readyset_calls = harness.readyset.calls();
    for _ in 0..5 {
        assert_eq!(assert_ok!(harness.read("SELECT 1").await), Target::Primary);
    }
    assert_eq!(harness.readyset.calls(), readyset_calls);

    harness.readyset.set_mode(Mode::Ok);
    harness.probe.set_healthy(true);
    tokio::time::sleep(HEALTHCHECK_INTERVAL * 2).await;

    assert!(harness.monitor().healthy());
    assert_eq!(harness.monitor().errors_in_window(), 0);
    assert_eq!(harness.pool.disconnects(), 2);
    assert_eq!(assert_ok!(harness.read("SELECT 1").await), Target::Readyset);
}

#[tokio::test(start_paused = true)]
async fn fallback_continues_while_probes_fail() {
    let harness = Harness::new();
    trip(&harness).await;

    tokio::time::sleep(HEALTHCHECK_INTERVAL * 5 + HEALTHCHECK_INTERVAL / 2).await;

    assert!(!harness.monitor().healthy());
    assert_eq!(harness.probe.calls(), 5);
    assert_eq!(assert_ok!(harness.read("SELECT 1").await), Target::Primary);

    let metrics = harness.monitor().metrics();
    assert_eq!(metrics.current_state, HealthState::Unhealthy);
    assert_eq!(metrics.probes, 5);
    assert_eq!(metrics.failed_probes, 5);
    assert_eq!(metrics.recovery_tasks_started, 1);

    harness.monitor().shutdown();
}

#[tokio::test]
async fn unmarked_connection_errors_never_trip() {
    let harness = Harness::new();
    harness.readyset.set_mode(Mode::UnmarkedConnectionLost);

    for _ in 0..10 {
        let err = assert_err!(harness.read("SELECT 1").await);
        assert!(matches!(err, FailoverError::Database(_)));
        assert!(harness.monitor().healthy());
    }

    assert_eq!(harness.pool.disconnects(), 0);
    assert_eq!(harness.monitor().metrics().exceptions_processed, 10);
}

#[tokio::test]
async fn query_errors_from_readyset_never_trip() {
    let harness = Harness::new();
    harness.readyset.set_mode(Mode::QueryError);

    for _ in 0..10 {
        let err = assert_err!(harness.read("SELECT * FROM missing").await);
        let FailoverError::Database(db) = err else {
            panic!("expected database error");
        };
        assert_eq!(db.code(), Some("42P01"));
        assert!(db.is_from_readyset());
    }

    assert!(harness.monitor().healthy());
}

#[tokio::test]
async fn write_rejected_on_read_only_route() {
    let harness = Harness::new();

    for _ in 0..10 {
        let err = assert_err!(
            harness
                .router
                .route(true, |db| async move { db.execute("UPDATE posts SET title = 'x'").await })
                .await
        );
        assert!(err.is_write_rejected());
    }

    assert!(harness.monitor().healthy());
    assert_eq!(harness.readyset.calls(), 0);
    assert_eq!(harness.monitor().metrics().exceptions_processed, 0);
}

#[tokio::test]
async fn writing_route_reaches_readyset() {
    let harness = Harness::new();

    let role = assert_ok!(
        harness
            .router
            .route(false, |db| async move {
                db.execute("UPDATE posts SET title = 'x'").await?;
                Ok(db.role())
            })
            .await
    );

    assert_eq!(role, Role::Writing);
    assert_eq!(harness.readyset.statements(), vec!["UPDATE posts SET title = 'x'"]);
}

#[tokio::test]
async fn context_added_by_the_operation_keeps_attribution() {
    let harness = Harness::new();
    harness.readyset.set_mode(Mode::ConnectionLost);

    for _ in 0..=WINDOW_SIZE {
        let result = harness
            .router
            .route_default(|db| async move {
                db.fetch_all("SELECT * FROM posts")
                    .await
                    .map_err(|e| e.context("loading posts"))
            })
            .await;
        let err = assert_err!(result);
        assert_eq!(err.to_string(), "loading posts");
    }

    assert!(!harness.monitor().healthy());
    harness.monitor().shutdown();
}

#[tokio::test]
async fn primary_errors_while_unhealthy_are_not_reported() {
    let harness = Harness::with_interval(Duration::from_secs(60));
    trip(&harness).await;
    let processed = harness.monitor().metrics().exceptions_processed;

    harness.primary.set_mode(Mode::ConnectionLost);
    for _ in 0..5 {
        assert_err!(harness.read("SELECT 1").await);
    }

    assert_eq!(harness.monitor().metrics().exceptions_processed, processed);
    harness.monitor().shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_trip_exactly_once() {
    let harness = Arc::new(Harness::with_interval(Duration::from_secs(60)));
    harness.readyset.set_mode(Mode::ConnectionLost);
    let barrier = Arc::new(tokio::sync::Barrier::new(32));

    let tasks: Vec<_> = (0..32)
        .map(|_| {
            let harness = harness.clone();
            let barrier = barrier.clone();
            tokio::spawn(async move {
                barrier.wait().await;
                let _ = harness.read("SELECT 1").await;
            })
        })
        .collect();
    for task in futures::future::join_all(tasks).await {
        assert_ok!(task);
    }

    assert!(!harness.monitor().healthy());
    assert_eq!(harness.pool.disconnects(), 1);
    let metrics = harness.monitor().metrics();
    assert_eq!(metrics.unhealthy_transitions, 1);
    assert_eq!(metrics.recovery_tasks_started, 1);
    harness.monitor().shutdown();
}
