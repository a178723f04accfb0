//! Application settings
//!
//! Persisted as JSON in the user config dir. Every field has a default so
//! a missing or partial file never blocks startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::audio::transport::TransportConfig;
use crate::audio::NOTE_SAMPLE_RATE;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub sample_rate: u32,
    pub tick_interval_ms: u64,
    pub meter_bars: usize,
    pub meter_divisor: f32,
    pub confirm_on_delete: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let defaults = TransportConfig::default();
        Self {
            sample_rate: NOTE_SAMPLE_RATE,
            tick_interval_ms: defaults.tick_interval.as_millis() as u64,
            meter_bars: defaults.meter_bars,
            meter_divisor: defaults.meter_divisor,
            confirm_on_delete: true,
        }
    }
}

impl Settings {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("murmur")
            .join("settings.json")
    }

    /// Load settings from `path`, falling back to defaults on a missing or
    /// unreadable file.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!("ignoring malformed settings file: {e}");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self).context("failed to serialize settings")?;
        fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            meter_bars: self.meter_bars,
            meter_divisor: self.meter_divisor,
        }
    }
}
