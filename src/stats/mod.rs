//! Running statistics.
//!
//! One aggregate, written by exactly two producers (the probe scheduler
//! and the failover monitor) and read by the reporter through immutable
//! snapshots. A single mutex keeps every update and snapshot read atomic
//! under the multi-threaded runtime; no operation here does I/O or fails.
//!
//! Invariant: `total_attempts == success + failed` after every update.
//! `mean_latency_ms` is the mean over *successful* probes only, while
//! `total_attempts` counts everything — observable behavior, kept as is.

use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::observability::metrics;
use crate::probe::{ProbeOutcome, ProbeResult};
use crate::store::MasterAddr;

/// A master promotion observed through the discovery tier. Consumed once.
#[derive(Debug, Clone)]
pub struct FailoverEvent {
    pub at: SystemTime,
    pub previous: MasterAddr,
    pub current: MasterAddr,
}

impl FailoverEvent {
    pub fn now(previous: MasterAddr, current: MasterAddr) -> Self {
        Self {
            at: SystemTime::now(),
            previous,
            current,
        }
    }
}

/// Immutable copy of the running counters, safe to hand to the reporter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub total_attempts: u64,
    pub success: u64,
    pub failed: u64,
    /// Mean latency of successful probes, in milliseconds.
    pub mean_latency_ms: f64,
    pub last_failover_unix_ms: Option<u64>,
}

#[derive(Default)]
struct Counters {
    total_attempts: u64,
    success: u64,
    failed: u64,
    mean_latency_ms: f64,
    last_failover_unix_ms: Option<u64>,
}

/// The statistics aggregate. Lives for the process lifetime, never reset.
#[derive(Default)]
pub struct ProbeStats {
    counters: Mutex<Counters>,
}

impl ProbeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one settled probe cycle into the aggregate.
    pub fn record_outcome(&self, outcome: &ProbeOutcome) {
        let latency_ms = outcome.latency.as_millis() as f64;
        {
            let mut counters = self.locked();
            counters.total_attempts += 1;
            match outcome.result {
                ProbeResult::Success => {
                    let prior = counters.success as f64;
                    counters.mean_latency_ms =
                        (counters.mean_latency_ms * prior + latency_ms) / (prior + 1.0);
                    counters.success += 1;
                }
                ProbeResult::Mismatch | ProbeResult::Error => counters.failed += 1,
            }
        }
        let measured = matches!(outcome.result, ProbeResult::Success).then_some(outcome.latency);
        metrics::record_cycle(outcome.result.as_str(), measured);
    }

    /// Record a master promotion. The probe counters are untouched.
    pub fn record_failover(&self, event: &FailoverEvent) {
        let unix_ms = event
            .at
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        self.locked().last_failover_unix_ms = Some(unix_ms);
        metrics::record_failover();
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let counters = self.locked();
        StatsSnapshot {
            total_attempts: counters.total_attempts,
            success: counters.success,
            failed: counters.failed,
            mean_latency_ms: counters.mean_latency_ms,
            last_failover_unix_ms: counters.last_failover_unix_ms,
        }
    }

    fn locked(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(|e| e.into_inner())
    }
}
