// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::camera::{SourceKind, StreamFormat};
use crate::constants::{
    APP_NAME, CONFIG_FILE_NAME, DEFAULT_FPS, DEFAULT_FRAME_TIMEOUT_MS, DEFAULT_HEIGHT,
    DEFAULT_WIDTH,
};
use crate::depth::Palette;
use crate::depth::constants::{COLORMAP_ALPHA, DEFAULT_DEPTH_SCALE};
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Depth source backend (V4L2 or synthetic)
    pub source: SourceKind,
    /// V4L2 device node; the first depth-capable node when unset
    pub device: Option<String>,
    /// Requested stream resolution and frame rate
    pub stream: StreamFormat,
    /// Meters per raw depth unit (0.001 for most RealSense, 0.0001 for D405)
    pub depth_scale: f32,
    /// Linear factor from raw units to colormap intensity
    pub colormap_alpha: f32,
    /// Display palette
    pub palette: Palette,
    /// Longest wait for one frame, in milliseconds
    pub frame_timeout_ms: u64,
    /// Where snapshots are written (default: ~/Pictures/depth-probe)
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceKind::default(), // V4L2
            device: None,
            stream: StreamFormat {
                width: DEFAULT_WIDTH,
                height: DEFAULT_HEIGHT,
                fps: DEFAULT_FPS,
            },
            depth_scale: DEFAULT_DEPTH_SCALE,
            colormap_alpha: COLORMAP_ALPHA,
            palette: Palette::default(),
            frame_timeout_ms: DEFAULT_FRAME_TIMEOUT_MS,
            snapshot_dir: None,
        }
    }
}

impl Config {
    /// Default config file location (`~/.config/depth-probe/config.json` on Linux)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the config from `path`, or from the default location
    ///
    /// A missing file yields the defaults; a file that exists but doesn't
    /// parse is an error.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let Some(path) = path.map(Path::to_path_buf).or_else(Self::default_path) else {
            debug!("No config directory, using defaults");
            return Ok(Self::default());
        };

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(AppError::Config(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let config: Config = serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Loaded config");
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make capture or annotation meaningless
    pub fn validate(&self) -> AppResult<()> {
        if self.stream.width == 0 || self.stream.height == 0 {
            return Err(AppError::Config(format!(
                "Stream resolution must be non-zero, got {}x{}",
                self.stream.width, self.stream.height
            )));
        }
        if self.stream.fps == 0 {
            return Err(AppError::Config("Frame rate must be non-zero".to_string()));
        }
        if !self.depth_scale.is_finite() || self.depth_scale <= 0.0 {
            return Err(AppError::Config(format!(
                "Depth scale must be a positive number, got {}",
                self.depth_scale
            )));
        }
        if !self.colormap_alpha.is_finite() || self.colormap_alpha <= 0.0 {
            return Err(AppError::Config(format!(
                "Colormap alpha must be a positive number, got {}",
                self.colormap_alpha
            )));
        }
        Ok(())
    }

    /// Directory snapshots are written to
    pub fn snapshot_directory(&self) -> PathBuf {
        self.snapshot_dir.clone().unwrap_or_else(|| {
            dirs::picture_dir()
                .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
                .join(APP_NAME)
        })
    }
}
