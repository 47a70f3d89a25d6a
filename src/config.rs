//! Engine configuration
//!
//! A single small TOML layer with built-in defaults. All values can be
//! omitted from the file; defaults are defined in code, not external files.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Tunable engine parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Bounded PCM queue capacity per decode channel, in chunks.
    ///
    /// This is the backpressure knob: a decode worker blocks once its queue
    /// holds this many undelivered chunks.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Gain ramp step in percentage points per mixed chunk.
    ///
    /// With ~23ms chunks, the default of 2 crosses the full 0..100 range in
    /// roughly a second.
    #[serde(default = "default_ramp_step")]
    pub ramp_step: i32,

    /// Output device name (None = system default device)
    #[serde(default)]
    pub output_device: Option<String>,

    /// Output ring buffer capacity in frames
    #[serde(default = "default_sink_buffer_frames")]
    pub sink_buffer_frames: usize,
}

fn default_queue_capacity() -> usize {
    5
}

fn default_ramp_step() -> i32 {
    2
}

fn default_sink_buffer_frames() -> usize {
    8192 // ~185ms @ 44.1kHz
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            ramp_step: default_ramp_step(),
            output_device: None,
            sink_buffer_frames: default_sink_buffer_frames(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;

        let config: EngineConfig = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))?;

        Ok(config)
    }
}
