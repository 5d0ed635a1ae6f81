//! Designer configuration.
//!
//! Every field has a default, so an absent or partial TOML file is fine.
//! Lookup order: an explicit path, then `<config dir>/playbook-designer/config.toml`,
//! then built-in defaults.

use crate::constants::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        /// The config file
        path: PathBuf,
        /// The underlying failure
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        /// The config file
        path: PathBuf,
        /// The parse failure
        #[source]
        source: toml::de::Error,
    },
}

/// Timing of simulated runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    /// Base duration of a trigger node, in milliseconds
    pub trigger_ms: u64,
    /// Base duration of a condition node, in milliseconds
    pub condition_ms: u64,
    /// Base duration of an action node, in milliseconds
    pub action_ms: u64,
    /// Upper bound of the jitter added to every duration, in milliseconds
    pub jitter_ms: u64,
    /// Seed of the jitter generator; equal seeds give equal timelines
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            trigger_ms: TRIGGER_DURATION_MS,
            condition_ms: CONDITION_DURATION_MS,
            action_ms: ACTION_DURATION_MS,
            jitter_ms: MAX_JITTER_MS,
            seed: 0,
        }
    }
}

/// Top-level configuration of the designer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DesignerConfig {
    /// Maximum number of undo entries kept by a session
    pub history_depth: usize,
    /// Directory holding the save slot
    pub save_slot_dir: PathBuf,
    /// Simulation timing
    pub simulation: SimulationConfig,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        Self {
            history_depth: MAX_UNDO_HISTORY,
            save_slot_dir: default_data_dir(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl DesignerConfig {
    /// Loads configuration from `path`, or from the default location if `path` is `None`.
    ///
    /// A missing file at the default location yields defaults; a missing file at an
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    log::debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    /// Parses configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR_NAME)
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join("config.toml"))
}
