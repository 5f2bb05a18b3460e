//! Metrics recording and exposition.
//!
//! # Metrics
//! - `kvprobe_cycles_total` (counter): settled cycles by result
//! - `kvprobe_probe_latency_ms` (histogram): successful-probe latency
//! - `kvprobe_failovers_total` (counter): observed master switches
//! - `kvprobe_connection_ready` (gauge): 1 = ready, 0 = not

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`. A failed install is logged
/// and the probe keeps running without exposition.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one settled probe cycle. `latency` is present only for
/// successful cycles, matching the mean-latency semantics.
pub fn record_cycle(result: &'static str, latency: Option<Duration>) {
    counter!("kvprobe_cycles_total", "result" => result).increment(1);
    if let Some(latency) = latency {
        histogram!("kvprobe_probe_latency_ms").record(latency.as_secs_f64() * 1000.0);
    }
}

pub fn record_failover() {
    counter!("kvprobe_failovers_total").increment(1);
}

pub fn record_connection_ready(ready: bool) {
    gauge!("kvprobe_connection_ready").set(if ready { 1.0 } else { 0.0 });
}
