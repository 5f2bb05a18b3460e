//! Probe cycle and statistics behavior against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use kvprobe::{ProbeExecutor, ProbeResult, ProbeScheduler, ProbeStats, Shutdown};

mod common;

#[tokio::test]
async fn test_three_clean_cycles_aggregate_exactly() {
    let store = common::ready_store().await;
    store.set_op_delay(Duration::from_millis(5));

    let stats = Arc::new(ProbeStats::new());
    let executor = ProbeExecutor::new(store.clone(), &common::probe_settings());

    let mut latencies = Vec::new();
    for _ in 0..3 {
        let outcome = executor.execute().await;
        assert_eq!(outcome.result, ProbeResult::Success);
        latencies.push(outcome.latency.as_millis() as f64);
        stats.record_outcome(&outcome);
    }

    let snap = stats.snapshot();
    assert_eq!(snap.total_attempts, 3);
    assert_eq!(snap.success, 3);
    assert_eq!(snap.failed, 0);
    assert!(snap.last_failover_unix_ms.is_none());

    let expected_mean = latencies.iter().sum::<f64>() / latencies.len() as f64;
    assert!((snap.mean_latency_ms - expected_mean).abs() < 1e-9);
}

#[tokio::test]
async fn test_mismatch_counts_as_failure_and_leaves_mean_alone() {
    let store = common::ready_store().await;
    let stats = Arc::new(ProbeStats::new());
    let executor = ProbeExecutor::new(store.clone(), &common::probe_settings());

    let outcome = executor.execute().await;
    assert_eq!(outcome.result, ProbeResult::Success);
    stats.record_outcome(&outcome);
    let mean_after_success = stats.snapshot().mean_latency_ms;

    store.corrupt_next_reads(1);
    let outcome = executor.execute().await;
    assert_eq!(outcome.result, ProbeResult::Mismatch);
    assert!(outcome.observed.is_some());
    stats.record_outcome(&outcome);

    let snap = stats.snapshot();
    assert_eq!(snap.total_attempts, 2);
    assert_eq!(snap.success, 1);
    assert_eq!(snap.failed, 1);
    assert_eq!(snap.mean_latency_ms, mean_after_success);
}

#[tokio::test]
async fn test_probe_keys_never_survive_a_cycle() {
    let store = common::ready_store().await;
    let executor = ProbeExecutor::new(store.clone(), &common::probe_settings());

    let clean = executor.execute().await;
    assert_eq!(clean.result, ProbeResult::Success);
    assert!(!store.contains_key(&clean.key));

    store.corrupt_next_reads(1);
    let mismatched = executor.execute().await;
    assert_eq!(mismatched.result, ProbeResult::Mismatch);
    assert!(!store.contains_key(&mismatched.key));
}

#[tokio::test]
async fn test_count_invariant_under_mixed_outcomes() {
    let store = common::ready_store().await;
    let stats = Arc::new(ProbeStats::new());
    let executor = ProbeExecutor::new(store.clone(), &common::probe_settings());

    for i in 0..10 {
        if i % 3 == 0 {
            store.fail_next_ops(1);
        }
        let outcome = executor.execute().await;
        stats.record_outcome(&outcome);
        let snap = stats.snapshot();
        assert_eq!(snap.total_attempts, snap.success + snap.failed);
    }

    let snap = stats.snapshot();
    assert_eq!(snap.total_attempts, 10);
    assert_eq!(snap.failed, 4);
}

#[tokio::test]
async fn test_scheduler_never_overlaps_cycles() {
    let store = common::ready_store().await;
    // Cycles take ~60ms (three ops at 20ms) against a 10ms interval, so an
    // overlapping scheduler would be caught immediately.
    store.set_op_delay(Duration::from_millis(20));

    let stats = Arc::new(ProbeStats::new());
    let executor = ProbeExecutor::new(store.clone(), &common::probe_settings());
    let scheduler = ProbeScheduler::new(executor, stats.clone(), Duration::from_millis(10));

    let shutdown = Shutdown::new();
    let handle = tokio::spawn(scheduler.run(shutdown.subscribe()));

    tokio::time::sleep(Duration::from_millis(300)).await;
    shutdown.trigger();
    handle.await.expect("scheduler task");

    assert!(stats.snapshot().total_attempts >= 2);
    assert_eq!(store.peak_concurrent_ops(), 1);
}
