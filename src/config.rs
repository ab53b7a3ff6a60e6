//! Run configuration
//!
//! Pipeline parameters plus what the CLI needs to drive a synthetic
//! acquisition, stored as one JSON document. Every field has a default, so a
//! file only needs the values it changes.

use anyhow::{Context, Result};
use fusion_daq_core::sim::DEFAULT_BURST_WORDS;
use fusion_daq_core::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_frames() -> u64 {
    1000
}

fn default_nor_burst_words() -> u32 {
    DEFAULT_BURST_WORDS
}

fn default_usb_seed() -> u32 {
    0x5EED
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Frames to acquire before the run stops
    #[serde(default = "default_frames")]
    pub frames: u64,
    /// Cycle limit for the run (None = derived from the frame count)
    #[serde(default)]
    pub max_cycles: Option<u64>,
    /// Words the host-bus model reads per `have_data` burst
    #[serde(default = "default_nor_burst_words")]
    pub nor_burst_words: u32,
    /// Percentage of cycles the USB bridge reports TXF
    #[serde(default)]
    pub usb_busy_percent: u32,
    #[serde(default = "default_usb_seed")]
    pub usb_seed: u32,
    /// Raw stream capture file (None = no capture)
    #[serde(default)]
    pub capture: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            frames: default_frames(),
            max_cycles: None,
            nor_burst_words: default_nor_burst_words(),
            usb_busy_percent: 0,
            usb_seed: default_usb_seed(),
            capture: None,
        }
    }
}

impl AppConfig {
    /// Load from `path`, falling back to defaults when the file does not exist.
    /// A file that exists but does not parse or validate is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config
            .pipeline
            .validate()
            .with_context(|| format!("Invalid pipeline configuration in {}", path.display()))?;
        tracing::info!(path = %path.display(), "Loaded config from disk");
        Ok(config)
    }

    /// Save config to disk, creating parent directories if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "Config saved to disk");
        Ok(())
    }

    /// Cycle budget for the run
    pub fn cycle_limit(&self) -> u64 {
        self.max_cycles.unwrap_or_else(|| {
            let per_frame = u64::from(self.pipeline.sample_clock_divisor())
                * u64::from(self.pipeline.decimation.value());
            // Slack for pipeline latency and a busy USB bridge
            self.frames.saturating_mul(per_frame).saturating_mul(2) + 100_000
        })
    }
}
