//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the probe.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the probe.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProbeConfig {
    /// Discovery tier and store credentials.
    pub discovery: DiscoveryConfig,

    /// Probe cycle settings.
    pub probe: ProbeSettings,

    /// Reconnect schedule.
    pub reconnect: ReconnectConfig,

    /// Summary reporting settings.
    pub report: ReportConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// How to reach the discovery tier and the store. Immutable after startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Ordered discovery-node addresses (`host:port`), tried first to last.
    pub nodes: Vec<String>,

    /// Logical master-group name tracked by the discovery tier.
    pub master_name: String,

    /// Desired role; only `master` is supported.
    pub role: String,

    /// Optional credential sent via AUTH after connecting to the master.
    pub password: Option<String>,

    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Per-command timeout in milliseconds.
    pub command_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["127.0.0.1:26379".to_string()],
            master_name: "mymaster".to_string(),
            role: "master".to_string(),
            password: None,
            connect_timeout_ms: 3_000,
            command_timeout_ms: 2_000,
        }
    }
}

/// Probe cycle settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Fixed delay between cycles in milliseconds, counted from the moment
    /// the previous cycle settles.
    pub interval_ms: u64,

    /// Namespace prefix for probe keys.
    pub key_prefix: String,

    /// Length of the random payload in characters.
    pub value_len: usize,

    /// Expiry on every probe write, in seconds. Bounds the lifetime of a
    /// key whose cleanup delete never ran.
    pub ttl_secs: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            interval_ms: 2_000,
            key_prefix: "probe:".to_string(),
            value_len: 16,
            ttl_secs: 10,
        }
    }
}

/// Reconnect schedule: `min(attempt × base, cap)` per attempt.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Base delay in milliseconds.
    pub base_delay_ms: u64,

    /// Delay cap in milliseconds.
    pub cap_delay_ms: u64,

    /// Consecutive failed attempts before the failure is fatal.
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            cap_delay_ms: 10_000,
            max_attempts: 10,
        }
    }
}

/// Summary reporting settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Interval between summaries in milliseconds.
    pub interval_ms: u64,

    /// Summary body format.
    pub format: SummaryFormat,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval_ms: 30_000,
            format: SummaryFormat::Text,
        }
    }
}

/// How the periodic summary is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryFormat {
    Text,
    Json,
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable the Prometheus exposition endpoint.
    pub metrics_enabled: bool,

    /// Exposition bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_address: "127.0.0.1:9184".to_string(),
        }
    }
}
