//! Command-line interface.
//!
//! A config file carries the full schema; the flags here cover the knobs
//! an operator changes per deployment. Flags win over file values.

use std::path::PathBuf;

use clap::Parser;

use crate::config::loader::{read_config, ConfigError};
use crate::config::schema::ProbeConfig;
use crate::config::validation::validate_config;

#[derive(Debug, Parser)]
#[command(
    name = "kvprobe",
    about = "Continuous reliability probe for a sentinel-fronted key-value store"
)]
pub struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Discovery node address (host:port); repeatable, replaces the
    /// configured list.
    #[arg(long = "discovery-node", value_name = "ADDR")]
    pub discovery_nodes: Vec<String>,

    /// Logical master-group name.
    #[arg(long, value_name = "NAME")]
    pub master_name: Option<String>,

    /// Store credential.
    #[arg(long, value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Fixed delay between probe cycles, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub interval_ms: Option<u64>,

    /// Delay between summary reports, in milliseconds.
    #[arg(long, value_name = "MS")]
    pub report_interval_ms: Option<u64>,

    /// Prometheus exposition address (host:port); implies metrics on.
    #[arg(long, value_name = "ADDR")]
    pub metrics_address: Option<String>,
}

impl Cli {
    /// Resolve the effective configuration: file (or defaults), then
    /// flags, then validation.
    pub fn load(&self) -> Result<ProbeConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ProbeConfig::default(),
        };
        self.apply(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply(&self, config: &mut ProbeConfig) {
        if !self.discovery_nodes.is_empty() {
            config.discovery.nodes = self.discovery_nodes.clone();
        }
        if let Some(master_name) = &self.master_name {
            config.discovery.master_name = master_name.clone();
        }
        if let Some(password) = &self.password {
            config.discovery.password = Some(password.clone());
        }
        if let Some(interval_ms) = self.interval_ms {
            config.probe.interval_ms = interval_ms;
        }
        if let Some(report_interval_ms) = self.report_interval_ms {
            config.report.interval_ms = report_interval_ms;
        }
        if let Some(metrics_address) = &self.metrics_address {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = metrics_address.clone();
        }
    }
}
