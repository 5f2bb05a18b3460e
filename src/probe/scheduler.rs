//! Probe cadence.
//!
//! One cycle in flight at a time: the next cycle starts only after the
//! previous one settles (success, mismatch or error) and the fixed
//! inter-cycle delay elapses. The delay is independent of how long the
//! cycle took, so a slow master is never probed harder than a healthy one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::probe::{ProbeExecutor, ProbeOutcome, ProbeResult};
use crate::stats::ProbeStats;
use crate::store::StoreClient;

pub struct ProbeScheduler<S> {
    executor: ProbeExecutor<S>,
    stats: Arc<ProbeStats>,
    interval: Duration,
}

impl<S: StoreClient> ProbeScheduler<S> {
    pub fn new(executor: ProbeExecutor<S>, stats: Arc<ProbeStats>, interval: Duration) -> Self {
        Self {
            executor,
            stats,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            "Probe loop starting"
        );

        loop {
            // The in-flight cycle always settles; shutdown is honored at
            // the next suspension point.
            let outcome = self.executor.execute().await;
            self.stats.record_outcome(&outcome);
            self.log_cycle(&outcome);

            tokio::select! {
                _ = time::sleep(self.interval) => {}
                _ = shutdown.recv() => {
                    tracing::info!("Probe loop received shutdown signal, exiting");
                    break;
                }
            }
        }
    }

    fn log_cycle(&self, outcome: &ProbeOutcome) {
        let latency_ms = outcome.latency.as_millis() as u64;
        let mean_latency_ms = self.stats.snapshot().mean_latency_ms;
        match outcome.result {
            ProbeResult::Success => tracing::info!(
                key = %outcome.key,
                latency_ms,
                mean_latency_ms = format_args!("{:.2}", mean_latency_ms),
                "Probe ok"
            ),
            ProbeResult::Mismatch => tracing::warn!(
                key = %outcome.key,
                expected = %outcome.expected,
                observed = outcome.observed.as_deref().unwrap_or("<absent>"),
                "Probe value mismatch"
            ),
            ProbeResult::Error => tracing::error!(
                key = %outcome.key,
                error = outcome.error_detail.as_deref().unwrap_or("unknown"),
                "Probe cycle failed"
            ),
        }
    }
}
