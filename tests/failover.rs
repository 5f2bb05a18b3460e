//! Failover handling and discovery failure behavior.

use std::sync::Arc;
use std::time::Duration;

use kvprobe::store::{MasterAddr, MemoryStore};
use kvprobe::{FailoverMonitor, FatalError, ProbeExecutor, ProbeResult, ProbeStats, Shutdown};

mod common;

#[tokio::test]
async fn test_mid_cycle_switch_yields_error_and_failover_timestamp() {
    let store = Arc::new(MemoryStore::new());
    let stats = Arc::new(ProbeStats::new());

    let mut monitor = FailoverMonitor::new(store.clone(), stats.clone(), common::fast_reconnect());
    monitor.connect_with_retries().await.expect("initial discovery");

    let shutdown = Shutdown::new();
    let monitor_task = tokio::spawn(monitor.run(shutdown.subscribe()));

    // The promotion interrupts the in-flight cycle: its write fails and
    // the topology announcement lands on the event feed.
    store.fail_next_ops(1);
    store.announce_master_switch(
        MasterAddr::new("10.0.0.1", 6379),
        MasterAddr::new("10.0.0.2", 6379),
    );

    let executor = ProbeExecutor::new(store.clone(), &common::probe_settings());
    let outcome = executor.execute().await;
    assert_eq!(outcome.result, ProbeResult::Error);
    stats.record_outcome(&outcome);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let snap = stats.snapshot();
    assert_eq!(snap.failed, 1);
    assert!(snap.last_failover_unix_ms.is_some());

    shutdown.trigger();
    monitor_task
        .await
        .expect("monitor task")
        .expect("monitor exits cleanly");
}

#[tokio::test]
async fn test_probes_recover_after_switch_and_reconnect() {
    let store = Arc::new(MemoryStore::new());
    let stats = Arc::new(ProbeStats::new());

    let mut monitor = FailoverMonitor::new(store.clone(), stats.clone(), common::fast_reconnect());
    monitor.connect_with_retries().await.expect("initial discovery");

    let shutdown = Shutdown::new();
    let monitor_task = tokio::spawn(monitor.run(shutdown.subscribe()));

    store.announce_master_switch(
        MasterAddr::new("10.0.0.1", 6379),
        MasterAddr::new("10.0.0.2", 6379),
    );
    store.drop_connection();

    // The monitor re-establishes on its own; no restart, no replay.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let executor = ProbeExecutor::new(store.clone(), &common::probe_settings());
    let outcome = executor.execute().await;
    assert_eq!(outcome.result, ProbeResult::Success);
    stats.record_outcome(&outcome);

    let snap = stats.snapshot();
    assert_eq!(snap.success, 1);
    assert!(snap.last_failover_unix_ms.is_some());

    shutdown.trigger();
    monitor_task
        .await
        .expect("monitor task")
        .expect("monitor exits cleanly");
}

#[tokio::test]
async fn test_unreachable_discovery_at_startup_is_fatal() {
    let store = Arc::new(MemoryStore::new());
    let stats = Arc::new(ProbeStats::new());
    store.refuse_establishes(u32::MAX);

    let mut monitor = FailoverMonitor::new(store.clone(), stats.clone(), common::fast_reconnect());
    let result = monitor.connect_with_retries().await;

    match result {
        Err(FatalError::Discovery { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected fatal discovery error, got {:?}", other),
    }
    // The probe loop was never entered.
    assert_eq!(stats.snapshot().total_attempts, 0);
}

#[tokio::test]
async fn test_reconnect_budget_exhaustion_is_fatal() {
    let store = Arc::new(MemoryStore::new());
    let stats = Arc::new(ProbeStats::new());

    let mut monitor = FailoverMonitor::new(store.clone(), stats.clone(), common::fast_reconnect());
    monitor.connect_with_retries().await.expect("initial discovery");

    let shutdown = Shutdown::new();
    let monitor_task = tokio::spawn(monitor.run(shutdown.subscribe()));

    store.refuse_establishes(u32::MAX);
    store.drop_connection();

    let result = tokio::time::timeout(Duration::from_secs(2), monitor_task)
        .await
        .expect("monitor settles within budget")
        .expect("monitor task");
    assert!(matches!(result, Err(FatalError::Discovery { .. })));
}

#[tokio::test]
async fn test_attempt_counter_resets_after_successful_reconnect() {
    let store = Arc::new(MemoryStore::new());
    let stats = Arc::new(ProbeStats::new());

    let mut monitor = FailoverMonitor::new(store.clone(), stats.clone(), common::fast_reconnect());
    monitor.connect_with_retries().await.expect("initial discovery");

    let shutdown = Shutdown::new();
    let monitor_task = tokio::spawn(monitor.run(shutdown.subscribe()));

    // Two outages in a row, each burning two of the three attempts. The
    // second recovers only if the counter restarted after the first.
    for _ in 0..2 {
        store.refuse_establishes(2);
        store.drop_connection();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let executor = ProbeExecutor::new(store.clone(), &common::probe_settings());
        assert_eq!(executor.execute().await.result, ProbeResult::Success);
    }

    shutdown.trigger();
    monitor_task
        .await
        .expect("monitor task")
        .expect("monitor exits cleanly");
}
