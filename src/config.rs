//! Configuration management for MIDI Gain
//!
//! Handles loading, parsing and validation of the YAML configuration file.
//! Every field has a default, so an empty file is a valid configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::fs;

use crate::parameter::DEFAULT_GAIN;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub midi: MidiConfig,
    pub timing: TimingConfig,
    pub gain: GainConfig,
}

/// MIDI input configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MidiConfig {
    /// Client name announced to the platform MIDI system
    pub client_name: String,
    /// Only inputs whose name contains this (case-insensitive) are used
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_filter: Option<String>,
    /// Only accept CCs on this channel (1-16); all channels when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
}

/// Polling cadences
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingConfig {
    pub device_refresh_ms: u64,
    pub status_poll_ms: u64,
}

/// Gain parameter configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GainConfig {
    pub default: f32,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            client_name: "MIDI-Gain".to_string(),
            device_filter: None,
            channel: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            device_refresh_ms: 2000,
            status_poll_ms: 1000,
        }
    }
}

impl Default for GainConfig {
    fn default() -> Self {
        Self { default: DEFAULT_GAIN }
    }
}

impl TimingConfig {
    pub fn device_refresh(&self) -> Duration {
        Duration::from_millis(self.device_refresh_ms)
    }

    pub fn status_poll(&self) -> Duration {
        Duration::from_millis(self.status_poll_ms)
    }
}

impl MidiConfig {
    /// Zero-based channel for the dispatcher
    pub fn channel_index(&self) -> Option<u8> {
        self.channel.map(|ch| ch.saturating_sub(1))
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config = Self::parse(&contents)
            .with_context(|| format!("Invalid config file: {}", path))?;

        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn parse(contents: &str) -> Result<Self> {
        // An empty document deserializes to null, not to an empty mapping
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.client_name.trim().is_empty() {
            anyhow::bail!("midi.client_name cannot be empty");
        }

        if let Some(channel) = self.midi.channel {
            if !(1..=16).contains(&channel) {
                anyhow::bail!("midi.channel must be between 1 and 16 (got {})", channel);
            }
        }

        if self.timing.device_refresh_ms == 0 {
            anyhow::bail!("timing.device_refresh_ms must be greater than 0");
        }
        if self.timing.status_poll_ms == 0 {
            anyhow::bail!("timing.status_poll_ms must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.gain.default) {
            anyhow::bail!("gain.default must be within [0, 1] (got {})", self.gain.default);
        }

        Ok(())
    }
}
