// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Engine configuration.
//!
//! Audio format, trigger source and log filter, loaded from YAML. Every
//! field has a default, so an empty file is a valid configuration.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Root engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Audio device settings
    #[serde(default)]
    pub audio: AudioConfig,
    /// Where button presses come from
    #[serde(default)]
    pub trigger: TriggerConfig,
    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load a configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {:?}", path.as_ref()))
    }

    /// Parse and validate a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: EngineConfig = if yaml.trim().is_empty() {
            EngineConfig::default()
        } else {
            serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")?
        };
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Save the configuration to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))
    }

    /// Check values that would make the engine unusable
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            bail!("audio.sample_rate must be greater than zero");
        }
        if self.audio.channels == 0 {
            bail!("audio.channels must be greater than zero");
        }
        let initial = self.audio.initial_capture_seconds;
        if initial.is_nan() || initial <= 0.0 {
            bail!(
                "audio.initial_capture_seconds must be positive, got {}",
                self.audio.initial_capture_seconds
            );
        }
        Ok(())
    }
}

/// Audio format settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// Sample rate in Hz
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Channel count
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Starting size of growable capture buffers, in seconds
    #[serde(default = "default_initial_capture")]
    pub initial_capture_seconds: f64,
}

fn default_sample_rate() -> u32 {
    48_000
}
fn default_channels() -> u16 {
    2
}
fn default_initial_capture() -> f64 {
    60.0
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            initial_capture_seconds: default_initial_capture(),
        }
    }
}

/// Kind of trigger source
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// Terminal keys
    #[default]
    Keyboard,
    /// Lines on standard input
    Console,
    /// MIDI footswitch
    Midi,
}

/// Trigger source settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerConfig {
    /// Which source to listen to
    #[serde(default)]
    pub source: TriggerKind,
    /// MIDI input port index
    #[serde(default)]
    pub midi_port: usize,
    /// Controller number of the footswitch (64 = sustain)
    #[serde(default = "default_midi_controller")]
    pub midi_controller: u8,
}

fn default_midi_controller() -> u8 {
    64
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            source: TriggerKind::default(),
            midi_port: 0,
            midi_controller: default_midi_controller(),
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter directive, used when RUST_LOG is unset
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.audio.sample_rate, 48_000);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.audio.initial_capture_seconds, 60.0);
        assert_eq!(config.trigger.source, TriggerKind::Keyboard);
        assert_eq!(config.trigger.midi_controller, 64);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
audio:
  sample_rate: 44100
trigger:
  source: midi
  midi_port: 2
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.audio.sample_rate, 44_100);
        assert_eq!(config.audio.channels, 2);
        assert_eq!(config.trigger.source, TriggerKind::Midi);
        assert_eq!(config.trigger.midi_port, 2);
        assert_eq!(config.trigger.midi_controller, 64);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(EngineConfig::from_yaml("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_validation() {
        assert!(EngineConfig::from_yaml("audio:\n  sample_rate: 0\n").is_err());
        assert!(EngineConfig::from_yaml("audio:\n  channels: 0\n").is_err());
        assert!(EngineConfig::from_yaml("audio:\n  initial_capture_seconds: -1\n").is_err());
        assert!(EngineConfig::from_yaml("trigger:\n  source: pedalboard\n").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("looper.yaml");

        let mut config = EngineConfig::default();
        config.trigger.source = TriggerKind::Console;
        config.logging.filter = "looper=debug".to_string();
        config.save(&path).unwrap();

        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = EngineConfig::load("/nonexistent/looper.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
