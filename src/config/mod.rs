//! Configuration management for the surface runner
//!
//! Handles loading, validation, and hot-reloading of the YAML configuration.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

pub use watcher::ConfigWatcher;

use crate::engine::EngineSettings;
use crate::host::MixerSnapshot;
use crate::scheduler::SchedulerSettings;
use crate::surface::{DeviceRole, SurfaceLayout, MAX_STRIPS};

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub midi: MidiConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
    /// Initial mixer state for the standalone runner
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mixer: Option<MixerSnapshot>,
}

/// MIDI port configuration (substring match, case-insensitive)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    pub input_port: String,
    pub output_port: String,
}

/// Which unit this is and which tracks it shows
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SurfaceConfig {
    #[serde(default)]
    pub role: DeviceRole,
    #[serde(default = "default_strip_count")]
    pub strip_count: u8,
    #[serde(default)]
    pub track_offset: u16,
    #[serde(default)]
    pub await_first_connect: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            role: DeviceRole::default(),
            strip_count: default_strip_count(),
            track_offset: 0,
            await_first_connect: false,
        }
    }
}

impl SurfaceConfig {
    pub fn layout(&self) -> SurfaceLayout {
        SurfaceLayout::new(self.role, self.strip_count, self.track_offset)
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.midi.input_port.is_empty() {
            anyhow::bail!("MIDI input_port cannot be empty");
        }
        if self.midi.output_port.is_empty() {
            anyhow::bail!("MIDI output_port cannot be empty");
        }

        if self.surface.strip_count == 0 || self.surface.strip_count > MAX_STRIPS {
            anyhow::bail!(
                "surface.strip_count {} is invalid (must be 1-{})",
                self.surface.strip_count,
                MAX_STRIPS
            );
        }
        if self
            .surface
            .track_offset
            .checked_add(self.surface.strip_count as u16)
            .is_none()
        {
            anyhow::bail!("surface.track_offset {} is out of range", self.surface.track_offset);
        }

        if self.scheduler.tick_budget == 0 {
            anyhow::bail!("scheduler.tick_budget must be at least 1");
        }
        if self.scheduler.tick_interval_ms == 0 {
            anyhow::bail!("scheduler.tick_interval_ms must be at least 1");
        }
        if self.scheduler.failure_warn_threshold == 0 {
            anyhow::bail!("scheduler.failure_warn_threshold must be at least 1");
        }

        Ok(())
    }

    /// Whether switching to `other` needs a restart (ports or layout changed)
    pub fn requires_restart(&self, other: &AppConfig) -> bool {
        self.surface != other.surface
            || self.midi.input_port != other.midi.input_port
            || self.midi.output_port != other.midi.output_port
    }
}

impl From<&AppConfig> for EngineSettings {
    fn from(config: &AppConfig) -> Self {
        EngineSettings {
            layout: config.surface.layout(),
            scheduler: config.scheduler.clone(),
            await_first_connect: config.surface.await_first_connect,
        }
    }
}

// Default value functions
fn default_strip_count() -> u8 { MAX_STRIPS }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
midi:
  input_port: "X-Touch"
  output_port: "X-Touch"
"#;

    fn parse(yaml: &str) -> AppConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(MINIMAL);
        config.validate().unwrap();

        assert_eq!(config.surface, SurfaceConfig::default());
        assert_eq!(config.scheduler, SchedulerSettings::default());
        assert!(config.mixer.is_none());

        let settings = EngineSettings::from(&config);
        assert_eq!(settings.layout, SurfaceLayout::default());
        assert!(!settings.await_first_connect);
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
midi:
  input_port: "X-Touch-Ext"
  output_port: "X-Touch-Ext"
surface:
  role: extender
  strip_count: 8
  track_offset: 8
  await_first_connect: true
scheduler:
  tick_budget: 8
  tick_interval_ms: 10
  failure_warn_threshold: 3
mixer:
  tracks:
    8: { name: "Keys" }
"#,
        );
        config.validate().unwrap();

        let settings = EngineSettings::from(&config);
        assert_eq!(settings.layout.role(), DeviceRole::Extender);
        assert!(settings.layout.is_known_track(15));
        assert!(!settings.layout.is_known_track(7));
        assert!(settings.await_first_connect);
        assert_eq!(settings.scheduler.tick_budget, 8);
        assert_eq!(config.mixer.unwrap().tracks[&8].name, "Keys");
    }

    #[test]
    fn test_validation_errors() {
        let mut config = parse(MINIMAL);
        config.surface.strip_count = 9;
        assert!(config.validate().is_err());

        let mut config = parse(MINIMAL);
        config.scheduler.tick_budget = 0;
        assert!(config.validate().is_err());

        let mut config = parse(MINIMAL);
        config.scheduler.failure_warn_threshold = 0;
        assert!(config.validate().is_err());

        let mut config = parse(MINIMAL);
        config.midi.output_port.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("output_port"));

        let mut config = parse(MINIMAL);
        config.surface.track_offset = u16::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_requires_restart() {
        let config = parse(MINIMAL);

        let mut tuned = config.clone();
        tuned.scheduler.tick_budget = 4;
        assert!(!config.requires_restart(&tuned));

        let mut moved = config.clone();
        moved.surface.track_offset = 8;
        assert!(config.requires_restart(&moved));
    }

    #[tokio::test]
    async fn test_load_from_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "{}", MINIMAL)?;

        let path = file.path().to_string_lossy().to_string();
        let config = AppConfig::load(&path).await?;
        assert_eq!(config.midi.input_port, "X-Touch");

        assert!(AppConfig::load("does/not/exist.yaml").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_load_rejects_invalid() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, "{}\nscheduler:\n  tick_budget: 0\n", MINIMAL)?;

        let path = file.path().to_string_lossy().to_string();
        assert!(AppConfig::load(&path).await.is_err());
        Ok(())
    }
}
