//! # Configuration
//!
//! `ipscout.toml` in the working directory (or `--config <path>`), then
//! environment overrides, then command-line overrides. A missing file means
//! defaults; a malformed file is an error.
//!
//! ```toml
//! [paths]
//! log_dir = "log"
//! save_dir = "saves"
//! graph_file = "session_graph.dot"
//!
//! [api_keys]
//! shodan = "..."
//!
//! [modules]
//! enabled = ["ping", "whois", "ipinfo"]
//!
//! [network]
//! timeout_secs = 10
//! ```

use ipscout_core::ReconError;
use ipscout_core::primitives::{DEFAULT_GRAPH_FILE, DEFAULT_LOG_DIR, DEFAULT_SAVE_DIR};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "ipscout.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub api_keys: ApiKeys,
    #[serde(default)]
    pub modules: ModulesConfig,
    #[serde(default)]
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub log_dir: PathBuf,
    pub save_dir: PathBuf,
    pub graph_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            save_dir: PathBuf::from(DEFAULT_SAVE_DIR),
            graph_file: PathBuf::from(DEFAULT_GRAPH_FILE),
        }
    }
}

/// API credentials. Absent keys disable the matching module at run time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub ipinfo: Option<String>,
    pub shodan: Option<String>,
    pub virustotal: Option<String>,
    pub securitytrails: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulesConfig {
    /// When set, only these modules are registered.
    pub enabled: Option<Vec<String>>,
}

impl ModulesConfig {
    /// Whether `name` should be registered.
    #[must_use]
    pub fn is_enabled(&self, name: &str) -> bool {
        self.enabled
            .as_ref()
            .is_none_or(|names| names.iter().any(|n| n == name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout_secs: u64,
    /// Passive DNS queries can be slow; they get their own timeout.
    pub pdns_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            pdns_timeout_secs: 300,
            user_agent: format!("ipscout/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl NetworkConfig {
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn pdns_timeout(&self) -> Duration {
        Duration::from_secs(self.pdns_timeout_secs)
    }
}

impl Config {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ReconError> {
        toml::from_str(text).map_err(|e| ReconError::ConfigError(e.to_string()))
    }

    /// Load from `path`, or from `ipscout.toml` when `None`.
    ///
    /// Only an explicitly named file is required to exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ReconError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !path.exists() {
            if required {
                return Err(ReconError::ConfigError(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path).map_err(|e| {
            ReconError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        let config = Self::from_toml_str(&text).map_err(|e| match e {
            ReconError::ConfigError(msg) => {
                ReconError::ConfigError(format!("failed to parse {}: {msg}", path.display()))
            }
            other => other,
        })?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    /// Apply `IPSCOUT_*` overrides looked up through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("IPSCOUT_IPINFO_KEY") {
            self.api_keys.ipinfo = Some(v);
        }
        if let Some(v) = non_empty("IPSCOUT_SHODAN_KEY") {
            self.api_keys.shodan = Some(v);
        }
        if let Some(v) = non_empty("IPSCOUT_VT_KEY") {
            self.api_keys.virustotal = Some(v);
        }
        if let Some(v) = non_empty("IPSCOUT_SECURITYTRAILS_KEY") {
            self.api_keys.securitytrails = Some(v);
        }
        if let Some(v) = non_empty("IPSCOUT_LOG_DIR") {
            self.paths.log_dir = PathBuf::from(v);
        }
        if let Some(v) = non_empty("IPSCOUT_SAVE_DIR") {
            self.paths.save_dir = PathBuf::from(v);
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }
}

// =============================================================================
// TESTS
// =============================================================================
