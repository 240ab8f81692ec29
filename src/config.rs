// SPDX-License-Identifier: GPL-3.0-only

use crate::errors::ConfigError;
use crate::inference::EngineOptions;
use crate::media::formats::{ChannelOrder, ChromaOrder, ColorRange, TargetPlatform};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory name under the platform config dir
const CONFIG_DIR_NAME: &str = "pose-stream";
const CONFIG_FILE_NAME: &str = "config.json";

/// Colour conversion backend preference
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Fixed-point conversion on the calling thread
    #[default]
    Cpu,
    /// wgpu compute shader, falling back to the CPU when unavailable
    Gpu,
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Platform preset for channel order and colour range
    pub target: TargetPlatform,
    /// Overrides the preset's channel order
    pub channel_order: Option<ChannelOrder>,
    /// Overrides the preset's colour range
    pub color_range: Option<ColorRange>,
    /// Overrides the preset's chroma order for two-plane frames
    pub interleaved_chroma: Option<ChromaOrder>,
    /// Colour conversion backend
    pub backend: BackendKind,
    /// Inference engine options
    pub engine: EngineOptions,
}

impl PipelineConfig {
    /// Preset for a target platform with default engine options
    pub fn for_target(target: TargetPlatform) -> Self {
        Self {
            target,
            ..Default::default()
        }
    }

    /// Channel order of the packed output
    pub fn channel_order(&self) -> ChannelOrder {
        self.channel_order
            .unwrap_or_else(|| self.target.channel_order())
    }

    /// Colour range assumed for incoming frames
    pub fn color_range(&self) -> ColorRange {
        self.color_range.unwrap_or_else(|| self.target.color_range())
    }

    /// Chroma order of two-plane input frames
    pub fn interleaved_chroma(&self) -> ChromaOrder {
        self.interleaved_chroma
            .unwrap_or_else(|| self.target.interleaved_chroma())
    }

    /// `<config dir>/pose-stream/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Read a configuration file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        debug!(path = %path.display(), "Loaded pipeline config");
        Ok(config)
    }

    /// Write the configuration as pretty JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        info!(path = %path.display(), "Saved pipeline config");
        Ok(())
    }

    /// Load from `path` (or the default location), using defaults if the
    /// file does not exist
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => {
                    info!("No config directory, using default pipeline config");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Location of the default config file, or an error if the platform has none
    pub fn require_default_path() -> Result<PathBuf, ConfigError> {
        Self::default_path().ok_or(ConfigError::NoConfigDir)
    }
}
