//! Daemon configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use bounty_ledger::LedgerConfig;
use bounty_utils::LogFormat;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("cannot serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Configuration for the `bounties` binary.
///
/// Every field has a default, so an empty file is a valid config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Directory holding the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in MiB.
    #[serde(default = "default_map_size_mb")]
    pub map_size_mb: usize,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Filter directive, e.g. "warn" or "info,bounty_ledger=debug".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub ledger: LedgerConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./bounty_data")
}

fn default_map_size_mb() -> usize {
    256
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            map_size_mb: default_map_size_mb(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            ledger: LedgerConfig::default(),
        }
    }
}

impl DaemonConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn map_size_bytes(&self) -> usize {
        self.map_size_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = DaemonConfig::from_toml_str("").unwrap();
        assert_eq!(config, DaemonConfig::default());
        assert!(!config.ledger.deadline_gates_acceptance);
        assert_eq!(config.map_size_bytes(), 256 * 1024 * 1024);
    }

    #[test]
    fn partial_file_overrides_fields() {
        let config = DaemonConfig::from_toml_str(
            r#"
            data_dir = "/var/lib/bounties"
            log_format = "json"

            [ledger]
            deadline_gates_acceptance = true
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/bounties"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.log_level, "warn");
        assert!(config.ledger.deadline_gates_acceptance);
        assert_eq!(config.ledger.event_channel_capacity, 256);
    }

    #[test]
    fn toml_round_trip() {
        let mut config = DaemonConfig::default();
        config.map_size_mb = 64;
        let text = config.to_toml_string().unwrap();
        assert_eq!(DaemonConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn unknown_log_format_is_rejected() {
        assert!(matches!(
            DaemonConfig::from_toml_str(r#"log_format = "xml""#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = DaemonConfig::from_toml_file(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
