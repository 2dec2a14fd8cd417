//! Host inventory loading
//!
//! The binary reads one JSON document describing the managed hosts (with
//! sealed secrets), transport settings, remediation targets and default
//! options:
//!
//! ```json
//! {
//!   "session": { "connectTimeoutSecs": 10, "commandTimeoutSecs": 120 },
//!   "remediation": { "limitsConf": "/etc/security/limits.conf", "useSudo": true },
//!   "defaults": { "username": "wmuser", "group": "wmuser" },
//!   "hosts": [
//!     { "id": 1, "name": "db01", "address": "10.0.0.5", "username": "ubuntu",
//!       "password": "<iv>:<tag>:<ciphertext>" }
//!   ]
//! }
//! ```
//!
//! Every section except `hosts` is optional.

use crate::constants::{SSH_COMMAND_TIMEOUT_SECS, SSH_CONNECT_TIMEOUT_SECS, SSH_HOST_KEY_ALGORITHMS};
use crate::core::{HostRecord, HostRegistry, KeyProvider, PrereqOptions, RemediationPaths};
use crate::platform::SessionConfig;
use crate::utils::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// SSH transport settings as written in the inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub host_key_algorithms: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: SSH_CONNECT_TIMEOUT_SECS,
            command_timeout_secs: SSH_COMMAND_TIMEOUT_SECS,
            host_key_algorithms: SSH_HOST_KEY_ALGORITHMS.to_string(),
        }
    }
}

impl From<&SessionSettings> for SessionConfig {
    fn from(settings: &SessionSettings) -> Self {
        SessionConfig {
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            command_timeout: Duration::from_secs(settings.command_timeout_secs),
            host_key_algorithms: settings.host_key_algorithms.clone(),
        }
    }
}

/// Parsed inventory document
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    #[serde(default)]
    pub session: SessionSettings,
    #[serde(default)]
    pub remediation: RemediationPaths,
    #[serde(default)]
    pub defaults: PrereqOptions,
    pub hosts: Vec<HostRecord>,
}

impl Inventory {
    /// Parse and validate an inventory document
    pub fn from_json(path: &str, raw: &str) -> Result<Self, ConfigError> {
        let inventory: Inventory = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })?;
        inventory.validate()?;
        Ok(inventory)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session.connect_timeout_secs == 0 || self.session.command_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "session timeouts must be greater than zero".to_string(),
            ));
        }
        if self.session.host_key_algorithms.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "hostKeyAlgorithms cannot be empty".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for host in &self.hosts {
            if !seen.insert(host.id) {
                return Err(ConfigError::DuplicateHost(host.id));
            }
            if host.address.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("host {} has no address", host.id)));
            }
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::from(&self.session)
    }

    /// Move the host records into a resolver that opens them with `keys`
    pub fn into_registry<K: KeyProvider>(self, keys: K) -> HostRegistry<K> {
        HostRegistry::with_hosts(keys, self.hosts)
    }
}

/// Read and validate the inventory at `path`
pub fn load_inventory(path: &Path) -> Result<Inventory, ConfigError> {
    let display = path.display().to_string();
    crate::logger::log_debug(&format!("load_inventory: reading '{}'", display));

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: display.clone(),
        source,
    })?;
    let inventory = Inventory::from_json(&display, &raw)?;

    crate::logger::log_info(&format!(
        "load_inventory: {} hosts from '{}'",
        inventory.hosts.len(),
        display
    ));
    Ok(inventory)
}
