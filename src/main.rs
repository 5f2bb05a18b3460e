//! kvprobe — continuous reliability probe for a sentinel-fronted
//! key-value store.
//!
//! Bootstraps logging, configuration and metrics, performs the initial
//! master discovery, then runs three long-lived tasks: the probe loop,
//! the failover monitor and the reporter. Exits non-zero only on an
//! unrecoverable discovery failure; every other error is absorbed into
//! statistics and the log stream.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use kvprobe::config::cli::Cli;
use kvprobe::{
    observability, FailoverMonitor, ProbeExecutor, ProbeScheduler, ProbeStats, Reporter,
    SentinelClient, Shutdown,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    observability::logging::init();

    tracing::info!("kvprobe v0.1.0 starting");

    let cli = Cli::parse();
    let config = cli.load()?;

    tracing::info!(
        discovery_nodes = ?config.discovery.nodes,
        master_name = %config.discovery.master_name,
        probe_interval_ms = config.probe.interval_ms,
        report_interval_ms = config.report.interval_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => observability::metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let client = Arc::new(SentinelClient::new(config.discovery.clone()));
    let stats = Arc::new(ProbeStats::new());
    let shutdown = Shutdown::new();

    // Block until discovery resolves a ready master; a spent retry budget
    // here is the one fatal exit, and the probe loop never starts.
    let mut monitor = FailoverMonitor::new(client.clone(), stats.clone(), config.reconnect.clone());
    monitor.connect_with_retries().await?;

    let executor = ProbeExecutor::new(client.clone(), &config.probe);
    let scheduler = ProbeScheduler::new(
        executor,
        stats.clone(),
        Duration::from_millis(config.probe.interval_ms),
    );
    let reporter = Reporter::new(stats.clone(), &config.report);

    let probe_task = tokio::spawn(scheduler.run(shutdown.subscribe()));
    let report_task = tokio::spawn(reporter.run(shutdown.subscribe()));
    let mut monitor_task = tokio::spawn(monitor.run(shutdown.subscribe()));

    tokio::select! {
        _ = shutdown.listen_for_interrupt() => {
            let _ = probe_task.await;
            let _ = report_task.await;
            let _ = (&mut monitor_task).await;
        }
        result = &mut monitor_task => {
            shutdown.trigger();
            let _ = probe_task.await;
            let _ = report_task.await;
            match result {
                Ok(Ok(())) => {}
                Ok(Err(fatal)) => {
                    tracing::error!(error = %fatal, "Fatal discovery failure");
                    return Err(fatal.into());
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failover monitor task failed");
                    return Err(e.into());
                }
            }
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
