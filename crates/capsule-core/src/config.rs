//! Configuration management for the capsule firmware.
//!
//! Every field has a default so an absent config file is a valid
//! configuration.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

use crate::APP_NAME;

/// Firmware-wide configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Overrides the default `<mount>/rec/` recordings directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recordings_dir: Option<PathBuf>,

    /// Advertised peripheral name.
    #[serde(default = "default_device_name")]
    pub device_name: String,

    /// Preferred MTU requested from the peer.
    #[serde(default = "default_preferred_mtu")]
    pub preferred_mtu: u16,

    /// Bound on how long to wait for the advertiser to confirm quiescence
    /// before starting the audio path.
    #[serde(default = "default_advertiser_quiesce_timeout_ms")]
    pub advertiser_quiesce_timeout_ms: u64,

    /// Quiescence delay after clearing the recording flag, before the
    /// writer finalizes.
    #[serde(default = "default_stop_quiescence_ms")]
    pub stop_quiescence_ms: u64,

    /// Log level fallback used when `CAPSULE_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_device_name() -> String {
    APP_NAME.to_string()
}

fn default_preferred_mtu() -> u16 {
    185
}

fn default_advertiser_quiesce_timeout_ms() -> u64 {
    200
}

fn default_stop_quiescence_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    crate::DEFAULT_LOG_LEVEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recordings_dir: None,
            device_name: default_device_name(),
            preferred_mtu: default_preferred_mtu(),
            advertiser_quiesce_timeout_ms: default_advertiser_quiesce_timeout_ms(),
            stop_quiescence_ms: default_stop_quiescence_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Recordings directory, falling back to `./rec` when unset (the real
    /// mount point is supplied by the outer binary's config override).
    pub fn recordings_dir(&self) -> PathBuf {
        self.recordings_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("rec"))
    }
}

/// Loads and saves [`Config`] as TOML under the platform config directory.
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Ok(Self { config_path })
    }

    #[cfg(test)]
    pub fn with_config_dir<P: AsRef<std::path::Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join(format!("{}.toml", APP_NAME));
        Self { config_path }
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("failed to resolve configuration directory")?;
        Ok(config_dir.join(APP_NAME).join(format!("{}.toml", APP_NAME)))
    }

    pub fn load(&self) -> Result<Config> {
        if !self.config_path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&self.config_path)
            .with_context(|| format!("failed to read config file at {:?}", self.config_path))?;

        toml::from_str(&content)
            .with_context(|| format!("failed to parse config file at {:?}", self.config_path))
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        let dir = self
            .config_path
            .parent()
            .with_context(|| format!("failed to get parent of {:?}", self.config_path))?;

        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory at {:?}", dir))?;

        let serialized =
            toml::to_string_pretty(config).context("failed to serialize configuration")?;

        fs::write(&self.config_path, serialized)
            .with_context(|| format!("failed to write config file at {:?}", self.config_path))
    }

    pub fn config_path(&self) -> &std::path::Path {
        &self.config_path
    }
}
