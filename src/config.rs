/// Application configuration
///
/// Stored as JSON at `<config_dir>/raw-darkroom/config.json`. Every field has
/// a default, so a partial file (or none at all) is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::export::ExportOptions;

pub const APP_DIR_NAME: &str = "raw-darkroom";

/// Percentile targets for the auto-adjust heuristic
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct AutoAdjustConfig {
    /// Fraction of pixels allowed to clip to black
    pub low_clip: f32,
    /// Fraction of pixels allowed to clip to white
    pub high_clip: f32,
    /// Linear value the median should land on after exposure
    pub target_median: f32,
    /// Linear value the high percentile should land on
    pub target_white: f32,
    /// Largest exposure change auto-adjust may apply, in stops
    pub max_exposure_shift: f32,
}

impl Default for AutoAdjustConfig {
    fn default() -> Self {
        Self {
            low_clip: 0.001,
            high_clip: 0.005,
            target_median: 0.18,
            target_white: 0.9,
            max_exposure_shift: 3.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Undo snapshots kept before the oldest is evicted
    pub undo_capacity: usize,
    /// Longest edge of the interactive preview render
    pub max_preview_dimension: u32,
    /// Weight of the previous histogram when blending in a new one (0 = no smoothing)
    pub histogram_smoothing: f32,
    /// Pixels the pointer must travel before a press becomes a drag
    pub drag_threshold_px: f32,
    /// Screen-space radius for grabbing a crop corner
    pub crop_handle_radius_px: f32,
    /// Degrees of rotation per dragged pixel
    pub rotate_sensitivity: f32,
    /// Bound on the arbitrary rotation angle, in degrees
    pub max_rotate_angle: f32,
    /// Override for the preset store location
    pub presets_path: Option<PathBuf>,
    /// Extension appended to the image path for sidecars
    pub sidecar_extension: String,
    /// Write the previous image's sidecar when switching images
    pub sidecar_autosave: bool,
    pub auto_adjust: AutoAdjustConfig,
    pub export: ExportOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            undo_capacity: 10,
            max_preview_dimension: 2560,
            histogram_smoothing: 0.6,
            drag_threshold_px: 3.0,
            crop_handle_radius_px: 16.0,
            rotate_sensitivity: 0.15,
            max_rotate_angle: 90.0,
            presets_path: None,
            sidecar_extension: "darkroom".to_string(),
            sidecar_autosave: true,
            auto_adjust: AutoAdjustConfig::default(),
            export: ExportOptions::default(),
        }
    }
}

impl AppConfig {
    /// Per-user application directory
    pub fn app_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME))
    }

    pub fn default_path() -> Option<PathBuf> {
        Self::app_dir().map(|d| d.join("config.json"))
    }

    /// Where presets live unless overridden
    pub fn presets_file(&self) -> PathBuf {
        self.presets_path.clone().unwrap_or_else(|| {
            Self::app_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("presets.json")
        })
    }

    /// Load from `path`. A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("📄 No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&text)?;
        tracing::info!("📄 Loaded config from {}", path.display());
        Ok(config.sanitized())
    }

    /// Load from the default location
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Pull out-of-range values back to something usable
    fn sanitized(mut self) -> Self {
        self.undo_capacity = self.undo_capacity.max(1);
        self.max_preview_dimension = self.max_preview_dimension.max(64);
        self.histogram_smoothing = self.histogram_smoothing.clamp(0.0, 0.99);
        self.drag_threshold_px = self.drag_threshold_px.max(0.0);
        self.max_rotate_angle = self.max_rotate_angle.clamp(0.0, 90.0);
        if self.sidecar_extension.is_empty() {
            self.sidecar_extension = Self::default().sidecar_extension;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "undo_capacity": 4, "auto_adjust": { "low_clip": 0.01 } }"#).unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.undo_capacity, 4);
        assert_eq!(config.auto_adjust.low_clip, 0.01);
        assert_eq!(config.auto_adjust.high_clip, AutoAdjustConfig::default().high_clip);
        assert_eq!(config.crop_handle_radius_px, 16.0);
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(AppConfig::load(&path).is_err());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.json");
        let mut config = AppConfig::default();
        config.rotate_sensitivity = 0.3;
        config.sidecar_autosave = false;
        config.save(&path).unwrap();
        assert_eq!(AppConfig::load(&path).unwrap(), config);
    }
}
