//! Driver configuration.
//!
//! Loaded from `.sqlport.json` in the working directory:
//!
//! ```json
//! {
//!   "drivers": {
//!     "search_paths": ["/usr/lib/sqlport", "./drivers"],
//!     "dynamic_loading": true
//!   }
//! }
//! ```
//!
//! Without a file, `SQLPORT_DRIVER_PATH` (platform path-list syntax) and
//! `SQLPORT_DYNAMIC_LOADING` are consulted.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = ".sqlport.json";

/// Directories scanned for driver modules, path-list syntax.
pub const DRIVER_PATH_ENV: &str = "SQLPORT_DRIVER_PATH";

/// `0`, `false`, `off` or `no` disables driver module loading.
pub const DYNAMIC_LOADING_ENV: &str = "SQLPORT_DYNAMIC_LOADING";

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub drivers: DriverConfig,
}

/// Where and whether to look for loadable driver modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
    #[serde(default = "default_dynamic_loading")]
    pub dynamic_loading: bool,
}

fn default_dynamic_loading() -> bool {
    true
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            dynamic_loading: default_dynamic_loading(),
        }
    }
}

impl DriverConfig {
    /// Build from environment variables. `None` when neither is set.
    pub fn from_env() -> Option<Self> {
        let paths = std::env::var_os(DRIVER_PATH_ENV);
        let loading = std::env::var(DYNAMIC_LOADING_ENV).ok();
        if paths.is_none() && loading.is_none() {
            return None;
        }

        let search_paths = paths
            .map(|p| {
                std::env::split_paths(&p)
                    .filter(|path| !path.as_os_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let dynamic_loading = loading.is_none_or(|v| {
            !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            )
        });

        Some(Self {
            search_paths,
            dynamic_loading,
        })
    }
}

impl Config {
    /// Parse a configuration file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read '{}': {e}", path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse '{}': {e}", path.display())))
    }

    /// Load `.sqlport.json` from the working directory, if present.
    pub fn load() -> Result<Option<Self>> {
        let path = Path::new(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(path).map(Some)
    }

    /// Resolve the effective configuration.
    ///
    /// Priority: config file > environment > defaults. A config file that
    /// exists but cannot be parsed is an error.
    pub fn resolve() -> Result<Self> {
        if let Some(config) = Self::load()? {
            tracing::debug!(file = CONFIG_FILE_NAME, "using configuration file");
            return Ok(config);
        }
        if let Some(drivers) = DriverConfig::from_env() {
            tracing::debug!("using driver configuration from environment");
            return Ok(Self { drivers });
        }
        Ok(Self::default())
    }
}
