//! Watcher configuration.
//!
//! Supports loading from YAML files with environment variable overrides.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use wemo_core::EnvironmentConfig;

/// Watcher configuration loaded from YAML with environment overrides.
///
/// ```yaml
/// explain: true
/// name_filter: lamp
/// environment:
///   device_kinds: [switch, insight]
///   callback_port_range: [8300, 8990]
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Print each device's services and actions when it is found.
    pub explain: bool,

    /// Only report devices whose name fuzzy-matches this pattern.
    /// Override: `WEMO_MATCH`
    pub name_filter: Option<String>,

    /// Settings passed to the core environment.
    pub environment: EnvironmentConfig,
}

impl WatchConfig {
    /// Loads configuration from a YAML file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::parse(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn parse(content: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty map.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("WEMO_SUBSCRIPTION_TIMEOUT") {
            if let Ok(secs) = val.parse() {
                self.environment.subscription_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("WEMO_HTTP_RETRIES") {
            if let Ok(retries) = val.parse() {
                self.environment.http_retries = retries;
            }
        }

        if let Ok(val) = std::env::var("WEMO_DISCOVERY_IPV6") {
            if let Ok(enabled) = val.parse() {
                self.environment.discovery_ipv6 = enabled;
            }
        }

        // Note: WEMO_ADVERTISE_IP and WEMO_MATCH are handled by clap via #[arg(env = ...)] in main.rs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wemo_core::DeviceKind;

    #[test]
    fn loads_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "explain: true\n\
             name_filter: lamp\n\
             environment:\n  \
               device_kinds: [switch, insight]\n  \
               callback_port_range: [9000, 9010]\n  \
               broadcast_timeout_secs: 30"
        )
        .unwrap();

        let config = WatchConfig::load(Some(file.path())).unwrap();
        assert!(config.explain);
        assert_eq!(config.name_filter.as_deref(), Some("lamp"));
        assert_eq!(
            config.environment.device_kinds,
            vec![DeviceKind::Switch, DeviceKind::Insight]
        );
        assert_eq!(config.environment.callback_port_range, (9000, 9010));
        assert_eq!(config.environment.broadcast_timeout_secs, 30);
        // Unspecified fields keep their defaults.
        assert_eq!(config.environment.http_retries, 3);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let config = WatchConfig::load(Some(file.path())).unwrap();
        assert!(!config.explain);
        assert!(config.environment.validate().is_ok());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = WatchConfig::load(Some(&dir.path().join("absent.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        assert!(WatchConfig::parse("environment:\n  device_kinds: [toaster]").is_err());
    }
}
