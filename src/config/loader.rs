//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ProbeConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation failed: {}", joined(.0))]
    Validation(Vec<ValidationError>),
}

fn joined(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read and parse a TOML config file without validating it; the caller
/// applies overrides first.
pub fn read_config(path: &Path) -> Result<ProbeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProbeConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SummaryFormat;

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let config: ProbeConfig = toml::from_str(
            r#"
            [discovery]
            nodes = ["10.0.0.5:26379", "10.0.0.6:26379"]
            master_name = "payments"
            password = "hunter2"

            [report]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.discovery.nodes.len(), 2);
        assert_eq!(config.discovery.master_name, "payments");
        assert_eq!(config.discovery.role, "master");
        assert_eq!(config.probe.interval_ms, 2_000);
        assert_eq!(config.report.format, SummaryFormat::Json);
    }

    #[test]
    fn test_unknown_format_fails_to_parse() {
        let parsed: Result<ProbeConfig, _> = toml::from_str(
            r#"
            [report]
            format = "xml"
            "#,
        );
        assert!(parsed.is_err());
    }
}
