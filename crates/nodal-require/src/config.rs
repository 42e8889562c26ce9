// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader configuration.
//!
//! Settings are layered: built-in defaults, then the user config file, then
//! `nodal.toml` in the working directory, then `NODAL_*` environment
//! variables. Every layer funnels through [`LoaderConfig::set`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{LoaderError, Result};

/// Default folder searched for bare specifiers.
pub const DEFAULT_DEPENDENCY_FOLDER: &str = "node_modules";

/// Default source-file extension appended during resolution.
pub const DEFAULT_EXTENSION: &str = ".js";

/// Default bound on lineage ascent.
pub const DEFAULT_MAX_LINEAGE_DEPTH: usize = 64;

/// Project-local config file name.
pub const PROJECT_CONFIG_FILE: &str = "nodal.toml";

/// How the fetcher defeats intermediate caches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachingFrequency {
    /// Leave caching to the transport
    #[default]
    #[serde(alias = "")]
    Auto,
    /// Fresh random token on every fetch
    Never,
    /// Token changes once a minute
    Minutely,
    /// Token changes once an hour
    Hourly,
    /// Token changes once a day
    Daily,
}

impl CachingFrequency {
    /// Length of the stable interval in milliseconds, for time-based modes.
    pub fn interval_millis(self) -> Option<i64> {
        match self {
            Self::Minutely => Some(60 * 1000),
            Self::Hourly => Some(60 * 60 * 1000),
            Self::Daily => Some(24 * 60 * 60 * 1000),
            Self::Auto | Self::Never => None,
        }
    }

    /// Config spelling of this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Never => "never",
            Self::Minutely => "minutely",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }
}

impl FromStr for CachingFrequency {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "never" => Ok(Self::Never),
            "minutely" => Ok(Self::Minutely),
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            other => Err(LoaderError::config(format!(
                "unknown caching frequency '{}' (expected auto, never, minutely, hourly or daily)",
                other
            ))),
        }
    }
}

impl fmt::Display for CachingFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a loader context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoaderConfig {
    /// Address used to absolutize empty or relative origins and `/` specifiers
    pub base_address: Option<String>,

    /// Cache-busting mode for fetches
    pub caching_frequency: CachingFrequency,

    /// Folder searched for bare specifiers
    pub dependency_folder: String,

    /// Extension appended to specifiers
    pub extension: String,

    /// Maximum number of ancestor directories searched for bare specifiers
    pub max_lineage_depth: usize,

    /// Transport timeout in seconds; none waits forever
    pub timeout: Option<u64>,

    /// Log level used by the CLI
    pub log_level: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_address: None,
            caching_frequency: CachingFrequency::Auto,
            dependency_folder: DEFAULT_DEPENDENCY_FOLDER.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            max_lineage_depth: DEFAULT_MAX_LINEAGE_DEPTH,
            timeout: None,
            log_level: "warn".to_string(),
        }
    }
}

impl LoaderConfig {
    /// Load configuration from default locations.
    pub fn load() -> Result<Self> {
        let mut config = LoaderConfig::default();

        if let Some(user_config_path) = user_config_path() {
            if user_config_path.exists() {
                config.merge_from_file(&user_config_path)?;
            }
        }

        let project_config = PathBuf::from(PROJECT_CONFIG_FILE);
        if project_config.exists() {
            config.merge_from_file(&project_config)?;
        }

        config.load_from_env(std::env::vars())?;

        Ok(config)
    }

    /// Merge configuration from a TOML file.
    pub fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        debug!("Reading loader config from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        self.merge_from_str(&content)
    }

    /// Merge configuration from TOML text.
    pub fn merge_from_str(&mut self, content: &str) -> Result<()> {
        let table: toml::Table = content.parse()?;

        for (key, value) in table {
            let value = match value {
                toml::Value::String(s) => s,
                other => other.to_string(),
            };
            self.set(&key, &value)?;
        }

        Ok(())
    }

    /// Apply `NODAL_*` variables from an environment listing.
    pub fn load_from_env(&mut self, vars: impl IntoIterator<Item = (String, String)>) -> Result<()> {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("NODAL_") {
                let config_key = config_key.to_lowercase().replace('_', "-");
                self.set(&config_key, &value)?;
            }
        }
        Ok(())
    }

    /// Set a configuration value.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key.replace('_', "-").as_str() {
            "base-address" => {
                self.base_address = (!value.is_empty()).then(|| value.to_string());
            }
            "caching-frequency" => self.caching_frequency = value.parse()?,
            "dependency-folder" => {
                let folder = value.trim_matches('/');
                if folder.is_empty() {
                    return Err(LoaderError::config("dependency-folder must not be empty"));
                }
                self.dependency_folder = folder.to_string();
            }
            "extension" => self.extension = value.to_string(),
            "max-lineage-depth" => {
                self.max_lineage_depth = value.parse().map_err(|_| {
                    LoaderError::config(format!("max-lineage-depth must be a number, got '{}'", value))
                })?;
            }
            "timeout" => {
                self.timeout = if value.is_empty() {
                    None
                } else {
                    Some(value.parse().map_err(|_| {
                        LoaderError::config(format!("timeout must be seconds, got '{}'", value))
                    })?)
                };
            }
            "log-level" => self.log_level = value.to_string(),
            other => warn!("Ignoring unknown config key '{}'", other),
        }
        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| LoaderError::config(e.to_string()))
    }
}

/// Get the user config path.
fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nodal").join("config.toml"))
}
