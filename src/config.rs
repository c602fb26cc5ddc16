//! Runtime configuration for the scope engine
//!
//! Three parameters are user-settable independent of acquisition state:
//! the baud rate, the redraw threshold N, and the per-channel buffer
//! capacity `max_samples`. Each comes from a fixed enumerated option set
//! (the values a host would expose in a dropdown); setting a value outside
//! its set is rejected and the prior value retained.
//!
//! # Persistence
//!
//! [`ScopeConfig`] persists as JSON in the platform data directory:
//!
//! - **Linux**: `~/.local/share/serialscope-rs/config.json`
//! - **macOS**: `~/Library/Application Support/serialscope-rs/config.json`
//! - **Windows**: `%APPDATA%\serialscope-rs\config.json`
//!
//! All IO is path-parameterized underneath so tests run against tempdirs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, ScopeError};

/// Application identifier for the data directory
pub const APP_ID: &str = "serialscope-rs";

/// Config filename inside the data directory
pub const CONFIG_FILE: &str = "config.json";

/// Selectable baud rates
pub const BAUD_RATES: &[u32] = &[
    110, 300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 38400, 57600, 115_200,
    128_000, 230_400, 250_000, 460_800, 500_000, 921_600, 1_000_000, 1_250_000,
    1_500_000, 2_000_000,
];

/// Default baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Selectable redraw thresholds (redraw every Nth accepted sample)
pub const REDRAW_EVERY_OPTIONS: &[u32] = &[
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100,
];

/// Selectable buffer capacities
pub const MAX_SAMPLES_OPTIONS: &[usize] = &[
    100, 200, 500, 1000, 2000, 5000, 10_000, 20_000, 50_000, 100_000,
];

/// Get the application data directory path
pub fn app_data_dir() -> Option<PathBuf> {
    dirs_next::data_dir().map(|p| p.join(APP_ID))
}

/// Get the default config file path
pub fn config_path() -> Option<PathBuf> {
    app_data_dir().map(|p| p.join(CONFIG_FILE))
}

/// Runtime configuration, persisted between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Last used serial port name, if any
    #[serde(default)]
    pub port: Option<String>,

    /// Serial baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Redraw every Nth accepted sample
    #[serde(default = "default_redraw_every")]
    pub redraw_every: u32,

    /// Per-channel window capacity
    #[serde(default = "default_max_samples")]
    pub max_samples: usize,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_redraw_every() -> u32 {
    crate::throttle::DEFAULT_REDRAW_EVERY
}

fn default_max_samples() -> usize {
    crate::buffer::DEFAULT_MAX_SAMPLES
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: DEFAULT_BAUD_RATE,
            redraw_every: default_redraw_every(),
            max_samples: default_max_samples(),
        }
    }
}

impl ScopeConfig {
    /// Set the baud rate; values outside [`BAUD_RATES`] are rejected and
    /// the prior value retained.
    pub fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        if !BAUD_RATES.contains(&baud) {
            return Err(ScopeError::Config(format!(
                "unsupported baud rate: {}",
                baud
            )));
        }
        self.baud_rate = baud;
        Ok(())
    }

    /// Set the redraw threshold; must be in [`REDRAW_EVERY_OPTIONS`].
    pub fn set_redraw_every(&mut self, every: u32) -> Result<()> {
        if !REDRAW_EVERY_OPTIONS.contains(&every) {
            return Err(ScopeError::Config(format!(
                "unsupported redraw interval: {}",
                every
            )));
        }
        self.redraw_every = every;
        Ok(())
    }

    /// Set the buffer capacity; must be in [`MAX_SAMPLES_OPTIONS`].
    pub fn set_max_samples(&mut self, max: usize) -> Result<()> {
        if !MAX_SAMPLES_OPTIONS.contains(&max) {
            return Err(ScopeError::Config(format!(
                "unsupported buffer capacity: {}",
                max
            )));
        }
        self.max_samples = max;
        Ok(())
    }

    /// Load config from an explicit path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScopeError::Config(format!("Failed to read config {:?}: {}", path, e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ScopeError::Config(format!("Failed to parse config {:?}: {}", path, e))
        })
    }

    /// Save config to an explicit path, creating parent directories
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ScopeError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ScopeError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            ScopeError::Config(format!("Failed to write config {:?}: {}", path, e))
        })
    }

    /// Load from the default location, falling back to defaults on any error
    pub fn load_or_default() -> Self {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    /// Save to the default location
    pub fn save(&self) -> Result<()> {
        let path = config_path().ok_or_else(|| {
            ScopeError::Config("Could not determine config path".to_string())
        })?;
        self.save_to(path)
    }
}
