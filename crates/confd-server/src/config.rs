//! Service configuration
//!
//! Read from an optional TOML, JSON or YAML file. Every field has a default,
//! so an empty or partial file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use confd_fs::{ConfigStore, RobustnessConfig};
use confd_watch::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Environment variable naming the configs root.
pub const CONFIGS_PATH_ENV: &str = "CONFIGS_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerSection,
    pub configs: ConfigsSection,
    pub watch: WatchSection,
    pub durability: DurabilitySection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Name reported by `initialize`
    pub name: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            name: "config".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigsSection {
    /// Root directory holding the served files
    pub path: PathBuf,
}

impl Default for ConfigsSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./conf"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    pub retry_initial_ms: u64,
    pub retry_max_ms: u64,
    pub retry_multiplier: f64,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            retry_initial_ms: 1000,
            retry_max_ms: 1000,
            retry_multiplier: 1.0,
        }
    }
}

impl WatchSection {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial: Duration::from_millis(self.retry_initial_ms),
            max: Duration::from_millis(self.retry_max_ms),
            multiplier: self.retry_multiplier,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurabilitySection {
    /// fsync temporary files before renaming them into place
    pub fsync: bool,
}

impl Default for DurabilitySection {
    fn default() -> Self {
        Self { fsync: true }
    }
}

impl DurabilitySection {
    pub fn robustness(&self) -> RobustnessConfig {
        RobustnessConfig {
            enable_fsync: self.fsync,
        }
    }
}

impl ServiceConfig {
    /// Load from `path`, or defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Ok(ConfigStore::new().load(path)?),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_reference_service() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.name, "config");
        assert_eq!(config.configs.path, PathBuf::from("./conf"));
        assert_eq!(config.watch.policy(), RetryPolicy::default());
        assert!(config.durability.robustness().enable_fsync);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [configs]
            path = "/srv/conf"

            [watch]
            retry_multiplier = 2.0
            retry_max_ms = 30000
            "#,
        )
        .unwrap();

        assert_eq!(config.configs.path, PathBuf::from("/srv/conf"));
        assert_eq!(config.server.name, "config");
        assert_eq!(
            config.watch.policy(),
            RetryPolicy {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(30),
                multiplier: 2.0,
            }
        );
    }

    #[test]
    fn load_without_file_is_default() {
        assert_eq!(ServiceConfig::load(None).unwrap(), ServiceConfig::default());
    }

    #[test]
    fn load_reads_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confd.yaml");
        std::fs::write(&path, "server:\n  name: edge\ndurability:\n  fsync: false\n").unwrap();

        let config = ServiceConfig::load(Some(&path)).unwrap();
        assert_eq!(config.server.name, "edge");
        assert!(!config.durability.fsync);
    }

    #[test]
    fn load_rejects_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confd.ini");
        std::fs::write(&path, "name = x").unwrap();

        assert!(ServiceConfig::load(Some(&path)).is_err());
    }
}
