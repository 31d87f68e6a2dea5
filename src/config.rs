// SPDX-License-Identifier: GPL-3.0-only

//! Persistent application configuration
//!
//! Stored as JSON under the user config directory
//! (`~/.config/patchscan/config.json`). A missing file yields the
//! defaults; a malformed file is an error rather than a silent reset.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::capture::device::CapturePolicies;
use crate::classify::preprocess::TensorLayout;
use crate::photo::CropGeometry;

const CONFIG_DIR: &str = "patchscan";
const CONFIG_FILE: &str = "config.json";

/// Configuration load/store errors
#[derive(Debug)]
pub enum ConfigFileError {
    /// The config file could not be read or written
    Io(std::io::Error),
    /// The config file exists but is not valid JSON for this schema
    Parse(serde_json::Error),
    /// No user config directory is available on this system
    NoConfigDir,
}

impl fmt::Display for ConfigFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFileError::Io(e) => write!(f, "Config file I/O error: {}", e),
            ConfigFileError::Parse(e) => write!(f, "Config file parse error: {}", e),
            ConfigFileError::NoConfigDir => write!(f, "No user config directory available"),
        }
    }
}

impl std::error::Error for ConfigFileError {}

impl From<std::io::Error> for ConfigFileError {
    fn from(err: std::io::Error) -> Self {
        ConfigFileError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigFileError {
    fn from(err: serde_json::Error) -> Self {
        ConfigFileError::Parse(err)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Capture device path; `None` selects the first enumerated device
    pub device_path: Option<String>,
    /// White balance and exposure policies applied at session start
    pub policies: CapturePolicies,
    /// Still-photo crop rectangle
    pub crop: CropGeometry,
    /// Path to the ONNX classifier model
    pub model_path: Option<PathBuf>,
    /// Tensor memory layout the model expects
    pub tensor_layout: TensorLayout,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_path: None,
            policies: CapturePolicies::default(),
            crop: CropGeometry::default(),
            model_path: None,
            tensor_layout: TensorLayout::default(),
        }
    }
}

impl Config {
    /// Path of the config file under the user config directory
    pub fn path() -> Result<PathBuf, ConfigFileError> {
        let dir = dirs::config_dir().ok_or(ConfigFileError::NoConfigDir)?;
        Ok(dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load the config, falling back to defaults when no file exists
    pub fn load() -> Result<Self, ConfigFileError> {
        let path = Self::path()?;
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(&path)?;
        let config = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    /// Persist the config, creating the directory if needed
    pub fn save(&self) -> Result<(), ConfigFileError> {
        let path = Self::path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        info!(path = %path.display(), "Config saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::device::{ExposurePolicy, WhiteBalancePolicy};

    #[test]
    fn test_default_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let parsed: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_locked_policies_round_trip() {
        let config = Config {
            policies: CapturePolicies::locked(),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert!(matches!(
            parsed.policies.white_balance,
            WhiteBalancePolicy::Locked { .. }
        ));
        assert!(matches!(
            parsed.policies.exposure,
            ExposurePolicy::Locked { .. }
        ));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let result: Result<Config, _> = serde_json::from_str("{not json");
        assert!(result.is_err());
    }
}
