//! Engine Configuration
//!
//! Settings are plain data, loaded from JSON. Every field has a default, so a
//! partial file (or `{}`) is valid.
//!
//! ```json
//! {
//!   "update_interval_ms": 200,
//!   "frame_interval_ms": 16,
//!   "max_schedule_sweeps": 10000,
//!   "snapshot_frames": true,
//!   "viewport": { "width": 512, "height": 512 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::graph::DEFAULT_MAX_SWEEPS;

/// Error loading or validating a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Output size handed to render callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
        }
    }
}

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Period of the Update Pass when driven periodically.
    pub update_interval_ms: u64,

    /// Period of the Frame Render Pass; `None` means frames are rendered on
    /// demand only.
    pub frame_interval_ms: Option<u64>,

    /// Cap on scheduler sweeps per pass.
    pub max_schedule_sweeps: usize,

    /// Snapshot the graph before each frame for abort logging.
    pub snapshot_frames: bool,

    /// Output size.
    pub viewport: Viewport,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 200,
            frame_interval_ms: None,
            max_schedule_sweeps: DEFAULT_MAX_SWEEPS,
            snapshot_frames: true,
            viewport: Viewport::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval_ms == 0 {
            return Err(ConfigError::Invalid("update_interval_ms must be positive".into()));
        }
        if self.frame_interval_ms == Some(0) {
            return Err(ConfigError::Invalid("frame_interval_ms must be positive".into()));
        }
        if self.max_schedule_sweeps == 0 {
            return Err(ConfigError::Invalid("max_schedule_sweeps must be positive".into()));
        }
        Ok(())
    }

    /// Update period as a `Duration`.
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.update_interval_ms)
    }

    /// Frame period as a `Duration`, if frames are periodic.
    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_interval_ms.map(Duration::from_millis)
    }
}
