//! Periodic summary reporting.
//!
//! A pure consumer on its own timer: every interval it takes an immutable
//! snapshot of the aggregate and emits one summary event. No logic beyond
//! formatting lives here.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::{ReportConfig, SummaryFormat};
use crate::stats::ProbeStats;

pub struct Reporter {
    stats: Arc<ProbeStats>,
    interval: Duration,
    format: SummaryFormat,
}

impl Reporter {
    pub fn new(stats: Arc<ProbeStats>, config: &ReportConfig) -> Self {
        Self {
            stats,
            interval: Duration::from_millis(config.interval_ms),
            format: config.format,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            "Reporter starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the first summary should
        // come one full interval in.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => self.emit(),
                _ = shutdown.recv() => {
                    tracing::info!("Reporter received shutdown signal, exiting");
                    break;
                }
            }
        }
    }

    fn emit(&self) {
        let snapshot = self.stats.snapshot();
        match self.format {
            SummaryFormat::Text => tracing::info!(
                total = snapshot.total_attempts,
                success = snapshot.success,
                fail = snapshot.failed,
                mean_latency_ms = format_args!("{:.2}", snapshot.mean_latency_ms),
                last_failover_unix_ms = snapshot.last_failover_unix_ms,
                "Probe summary"
            ),
            SummaryFormat::Json => match serde_json::to_string(&snapshot) {
                Ok(body) => tracing::info!(summary = %body, "Probe summary"),
                Err(e) => tracing::error!(error = %e, "Failed to serialize summary"),
            },
        }
    }
}
