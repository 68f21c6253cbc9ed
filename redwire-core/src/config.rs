//! Tunables for the redstone automaton, read from `redwire_config.json5`.

use std::{fs, io, path::Path, time::Duration};

use serde::Deserialize;
use thiserror::Error;

use crate::redstone::propagation::PropagationSettings;
use crate::redstone::worklist::ExtractionOrder;

const DEFAULT_CONFIG: &str = include_str!("../../package-content/redwire_config.json5");

/// Errors raised while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read or the default could not be written.
    #[error("failed to access config file: {0}")]
    Io(#[from] io::Error),
    /// The file is not valid JSON5 or does not match the expected shape.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json5::Error),
    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

/// Redstone automaton configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RedstoneConfig {
    /// Milliseconds between passes.
    pub tick_interval_ms: u64,
    /// Tallest torch stack resolved within one expansion.
    pub max_elevator_height: usize,
    /// Traversal rounds a pass may run before committing anyway.
    pub max_settle_rounds: usize,
    /// Which end of the open set the traversal takes nodes from.
    pub extraction_order: ExtractionOrder,
    /// Log filter used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for RedstoneConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 200,
            max_elevator_height: 16,
            max_settle_rounds: 32,
            extraction_order: ExtractionOrder::Fifo,
            log_filter: "info".to_string(),
        }
    }
}

impl RedstoneConfig {
    /// Loads the config at `path`, writing the default file there first if
    /// it does not exist.
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let config = Self::from_json5(&fs::read_to_string(path)?)?;
            log::debug!("Loaded config from {}", path.display());
            Ok(config)
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, DEFAULT_CONFIG)?;
            log::info!("Wrote default config to {}", path.display());
            Self::from_json5(DEFAULT_CONFIG)
        }
    }

    /// Parses and validates a JSON5 document. Missing keys take their defaults.
    pub fn from_json5(source: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json5::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid("Tick interval must be at least 1ms"));
        }
        if !(1..=256).contains(&self.max_elevator_height) {
            return Err(ConfigError::Invalid("Max elevator height must be in range 1..=256"));
        }
        if self.max_settle_rounds == 0 {
            return Err(ConfigError::Invalid("Max settle rounds must be at least 1"));
        }
        Ok(())
    }

    /// Time between passes.
    #[must_use]
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// The propagation tunables this config selects.
    #[must_use]
    pub const fn propagation(&self) -> PropagationSettings {
        PropagationSettings {
            order: self.extraction_order,
            max_elevator_height: self.max_elevator_height,
            max_settle_rounds: self.max_settle_rounds,
        }
    }
}
