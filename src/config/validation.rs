//! Configuration validation.
//!
//! Semantic checks on top of serde's syntactic ones: address shapes, value
//! ranges, and the role constraint. All violations are reported, not just
//! the first.

use crate::config::schema::ProbeConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("discovery.nodes must name at least one node")]
    NoDiscoveryNodes,

    #[error("discovery.nodes entry {0:?} is not host:port")]
    MalformedNodeAddress(String),

    #[error("discovery.master_name must not be empty")]
    EmptyMasterName,

    #[error("discovery.role {0:?} is unsupported; only \"master\" probes are supported")]
    UnsupportedRole(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("reconnect.cap_delay_ms must be at least reconnect.base_delay_ms")]
    CapBelowBase,

    #[error("probe.key_prefix must not be empty")]
    EmptyKeyPrefix,
}

/// Check everything serde cannot. Returns every violation found.
pub fn validate_config(config: &ProbeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.discovery.nodes.is_empty() {
        errors.push(ValidationError::NoDiscoveryNodes);
    }
    for node in &config.discovery.nodes {
        if !is_host_port(node) {
            errors.push(ValidationError::MalformedNodeAddress(node.clone()));
        }
    }
    if config.discovery.master_name.is_empty() {
        errors.push(ValidationError::EmptyMasterName);
    }
    if config.discovery.role != "master" {
        errors.push(ValidationError::UnsupportedRole(config.discovery.role.clone()));
    }

    for (value, field) in [
        (config.discovery.connect_timeout_ms, "discovery.connect_timeout_ms"),
        (config.discovery.command_timeout_ms, "discovery.command_timeout_ms"),
        (config.probe.interval_ms, "probe.interval_ms"),
        (config.probe.ttl_secs, "probe.ttl_secs"),
        (config.probe.value_len as u64, "probe.value_len"),
        (config.reconnect.base_delay_ms, "reconnect.base_delay_ms"),
        (config.reconnect.cap_delay_ms, "reconnect.cap_delay_ms"),
        (u64::from(config.reconnect.max_attempts), "reconnect.max_attempts"),
        (config.report.interval_ms, "report.interval_ms"),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroValue(field));
        }
    }

    if config.reconnect.cap_delay_ms < config.reconnect.base_delay_ms {
        errors.push(ValidationError::CapBelowBase);
    }
    if config.probe.key_prefix.is_empty() {
        errors.push(ValidationError::EmptyKeyPrefix);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_host_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(validate_config(&ProbeConfig::default()).is_ok());
    }

    #[test]
    fn test_all_errors_are_reported() {
        let mut config = ProbeConfig::default();
        config.discovery.nodes = vec!["not-an-address".to_string()];
        config.discovery.master_name.clear();
        config.probe.interval_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::MalformedNodeAddress(
            "not-an-address".to_string()
        )));
        assert!(errors.contains(&ValidationError::EmptyMasterName));
        assert!(errors.contains(&ValidationError::ZeroValue("probe.interval_ms")));
    }

    #[test]
    fn test_replica_role_is_rejected() {
        let mut config = ProbeConfig::default();
        config.discovery.role = "replica".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::UnsupportedRole("replica".to_string())]
        );
    }

    #[test]
    fn test_cap_must_cover_base() {
        let mut config = ProbeConfig::default();
        config.reconnect.base_delay_ms = 5_000;
        config.reconnect.cap_delay_ms = 1_000;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::CapBelowBase]);
    }
}
