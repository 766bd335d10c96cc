//! Configuration file parsing and merging
//!
//! This module handles parsing of `deckhand.toml` and `deckhand.local.toml`
//! files. The local file is meant for per-operator overrides (SSH identity,
//! user names) and is merged over the shared one.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Name of the shared configuration file
pub const CONFIG_FILE: &str = "deckhand.toml";

/// Name of the per-operator override file
pub const LOCAL_CONFIG_FILE: &str = "deckhand.local.toml";

/// Default location of `virtualenv.py` used when bootstrapping environments
pub const DEFAULT_VIRTUALENV_SOURCE: &str =
    "http://bitbucket.org/ianb/virtualenv/raw/eb94c9ebe0ba/virtualenv.py";

/// Main configuration structure for deckhand
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SSH connection settings
    pub ssh: SshConfig,

    /// Role name to host list
    pub roles: BTreeMap<String, Vec<String>>,

    /// Template variables
    pub vars: BTreeMap<String, String>,

    /// Virtual environment settings
    pub virtualenv: VirtualenvConfig,

    /// Account provisioning settings
    pub account: AccountConfig,

    /// Tree sync defaults
    pub sync: SyncConfig,
}

/// SSH connection settings applied to every host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Login user when the host string has none
    pub user: Option<String>,

    /// Port when the host string has none
    pub port: Option<u16>,

    /// Identity file passed with `-i`
    pub identity_file: Option<Utf8PathBuf>,

    /// Extra `-o` options, e.g. `StrictHostKeyChecking=accept-new`
    #[serde(default)]
    pub options: Vec<String>,
}

/// Virtual environment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VirtualenvConfig {
    /// Activation script template used by `run --virtualenv`
    pub activate: String,

    /// URL of `virtualenv.py` for bootstrapping
    pub source: String,
}

impl Default for VirtualenvConfig {
    fn default() -> Self {
        Self {
            activate: "{home}/releases/{base}/bin/activate".to_string(),
            source: DEFAULT_VIRTUALENV_SOURCE.to_string(),
        }
    }
}

/// Account provisioning settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Public keys written to the managed `authorized_keys2`
    ///
    /// Unset leaves the file alone; an empty list clears it down to the header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorized_keys: Option<Vec<String>>,
}

/// Tree sync defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Source paths that are never uploaded
    #[serde(default)]
    pub exclude: Vec<Utf8PathBuf>,

    /// Glob patterns matched against source paths
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Config {
    /// Load configuration from a directory.
    ///
    /// This loads `deckhand.toml` and merges `deckhand.local.toml` over it if
    /// it exists. Missing files yield the default configuration.
    pub fn load(config_dir: &Utf8Path) -> Result<Self> {
        let config_path = config_dir.join(CONFIG_FILE);
        let local_config_path = config_dir.join(LOCAL_CONFIG_FILE);

        let base_config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<toml::Value>(&content)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let local_config = if local_config_path.exists() {
            let content = std::fs::read_to_string(&local_config_path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        } else {
            None
        };

        let merged = if let Some(local) = local_config {
            merge_toml_values(base_config, local)
        } else {
            base_config
        };

        let config: Config = merged.try_into()?;
        tracing::debug!(dir = %config_dir, roles = config.roles.len(), "Loaded configuration");

        Ok(config)
    }

    /// Load configuration from a string (for testing)
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Hosts assigned to a role
    pub fn role_hosts(&self, role: &str) -> Result<&[String]> {
        self.roles.get(role).map(Vec::as_slice).ok_or_else(|| {
            let available = if self.roles.is_empty() {
                "(none configured)".to_string()
            } else {
                self.roles.keys().cloned().collect::<Vec<_>>().join(", ")
            };
            Error::config(
                format!("Role '{}' not found in {}", role, CONFIG_FILE),
                format!("Available roles: {}", available),
            )
        })
    }
}

/// Merge two TOML values:
/// - Tables: recursively merged
/// - Arrays: local replaces base (not merged)
/// - Primitives: local overrides base
fn merge_toml_values(base: toml::Value, local: toml::Value) -> toml::Value {
    match (base, local) {
        (toml::Value::Table(mut base_table), toml::Value::Table(local_table)) => {
            for (key, local_value) in local_table {
                if let Some(base_value) = base_table.remove(&key) {
                    base_table.insert(key, merge_toml_values(base_value, local_value));
                } else {
                    base_table.insert(key, local_value);
                }
            }
            toml::Value::Table(base_table)
        }
        (_, local) => local,
    }
}
