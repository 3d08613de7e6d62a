//! Configuration management for Glovelight
//!
//! Handles loading, validating and persisting the YAML Glovelight file.
//! The file lists the MIDI→light mappings and the bridge credentials; the
//! credentials are written back after first-time pairing.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::bridge::LightId;

/// MIDI input used when a controller does not name one
pub const DEFAULT_MIDI_INPUT: &str = "Glover";

/// MIDI channel (1-indexed) used when a controller does not name one
pub const DEFAULT_MIDI_CHANNEL: u8 = 1;

/// Highest valid CC number / CC value
pub const MAX_CC: u8 = 127;

/// Errors raised while loading, validating or writing the Glovelight file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read Glovelight file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse Glovelight file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize Glovelight config: {0}")]
    Serialize(#[source] serde_yaml::Error),

    #[error("Failed to write Glovelight file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Controller {index}: {reason}")]
    InvalidController { index: usize, reason: String },

    #[error("Invalid limits: {0}")]
    InvalidLimits(String),
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct GlovelightConfig {
    #[serde(default)]
    pub controllers: Vec<ControllerConfig>,

    /// Bridge address; empty triggers discovery
    #[serde(default)]
    pub bridge_ip: String,

    /// Bridge user token; empty triggers pairing
    #[serde(default)]
    pub user: String,

    #[serde(default, skip_serializing_if = "LimitsConfig::is_default")]
    pub limits: LimitsConfig,

    /// Where this config was loaded from, used to persist credentials
    #[serde(skip)]
    pub location: PathBuf,
}

/// One MIDI CC pair → set of lights mapping
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ControllerConfig {
    #[serde(default)]
    pub bulb_ids: Vec<LightId>,

    #[serde(default = "default_midi_input")]
    pub midi_input: String,

    /// 1-indexed; 0 means unset
    #[serde(default = "default_midi_channel")]
    pub midi_channel: u8,

    /// Missing means CC 0
    #[serde(default)]
    pub x_cc: u8,
    #[serde(default)]
    pub y_cc: u8,
}

/// Rate limits and queue sizing for the light pipeline
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    pub input_rate_hz: f64,
    pub input_burst: u32,
    pub output_rate_hz: f64,
    pub output_burst: u32,
    pub queue_capacity: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            input_rate_hz: 12.0,
            input_burst: 1,
            output_rate_hz: 12.0,
            output_burst: 12,
            queue_capacity: 12,
        }
    }
}

impl LimitsConfig {
    fn is_default(&self) -> bool {
        *self == Self::default()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, rate) in [
            ("input_rate_hz", self.input_rate_hz),
            ("output_rate_hz", self.output_rate_hz),
        ] {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(ConfigError::InvalidLimits(format!(
                    "{} must be a positive number, got {}",
                    name, rate
                )));
            }
        }
        for (name, value) in [
            ("input_burst", self.input_burst as usize),
            ("output_burst", self.output_burst as usize),
            ("queue_capacity", self.queue_capacity),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidLimits(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }
        Ok(())
    }
}

impl ControllerConfig {
    /// Fill in unset fields with their defaults
    fn apply_defaults(&mut self) {
        if self.midi_input.is_empty() {
            self.midi_input = DEFAULT_MIDI_INPUT.to_string();
        }
        if self.midi_channel == 0 {
            self.midi_channel = DEFAULT_MIDI_CHANNEL;
        }
    }

    /// Wire channel (0-15) this controller listens on
    pub fn wire_channel(&self) -> u8 {
        self.midi_channel.saturating_sub(1)
    }

    fn validate(&self, index: usize) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidController { index, reason };

        if !(1..=16).contains(&self.midi_channel) {
            return Err(invalid(format!(
                "midi_channel must be 1-16, got {}",
                self.midi_channel
            )));
        }
        for (name, cc) in [("x_cc", self.x_cc), ("y_cc", self.y_cc)] {
            if cc > MAX_CC {
                return Err(invalid(format!("{} must be 0-127, got {}", name, cc)));
            }
        }

        let mut seen = HashSet::new();
        for id in &self.bulb_ids {
            if !seen.insert(id) {
                return Err(invalid(format!("bulb id {} listed twice", id)));
            }
        }

        if self.x_cc == self.y_cc {
            warn!(
                "Controller {} uses CC {} for both X and Y; only X will be updated",
                index, self.x_cc
            );
        }
        if self.bulb_ids.is_empty() {
            warn!("Controller {} has no bulb_ids and will never emit", index);
        }
        Ok(())
    }
}

impl GlovelightConfig {
    /// Parse a Glovelight document, applying defaults and validating it
    pub fn from_yaml(contents: &str, location: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let location = location.into();
        let mut config: GlovelightConfig =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: location.clone(),
                source,
            })?;

        config.location = location;
        for controller in &mut config.controllers {
            controller.apply_defaults();
        }
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config = Self::from_yaml(&contents, path)?;
        debug!(
            "Loaded {} controller(s) from {}",
            config.controllers.len(),
            path.display()
        );
        Ok(config)
    }

    /// Check every controller and the limits section
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (index, controller) in self.controllers.iter().enumerate() {
            controller.validate(index)?;
        }
        self.limits.validate()
    }

    /// Whether both bridge address and user token are present
    pub fn has_bridge_credentials(&self) -> bool {
        !self.bridge_ip.is_empty() && !self.user.is_empty()
    }

    /// Write the configuration back to the file it was loaded from
    pub async fn save(&self) -> Result<(), ConfigError> {
        info!("Writing Glovelight file to: {}", self.location.display());

        let yaml = serde_yaml::to_string(self).map_err(ConfigError::Serialize)?;
        fs::write(&self.location, yaml)
            .await
            .map_err(|source| ConfigError::Write {
                path: self.location.clone(),
                source,
            })
    }
}

fn default_midi_input() -> String {
    DEFAULT_MIDI_INPUT.to_string()
}

fn default_midi_channel() -> u8 {
    DEFAULT_MIDI_CHANNEL
}
