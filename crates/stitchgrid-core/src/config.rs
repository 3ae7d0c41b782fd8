//! Engine configuration.
//!
//! Every field has a default, so a config file only needs the values it
//! wants to change.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Invalid config: {0}")]
    Parse(String),
}

/// Viewport sizing and zoom limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewportConfig {
    /// Gap between the container edge and the grid, in screen pixels.
    pub padding: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Factor applied by one zoom-in / zoom-out step.
    pub zoom_step: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            padding: 0.0,
            min_zoom: 0.1,
            max_zoom: 10.0,
            zoom_step: 1.2,
        }
    }
}

/// Pointer interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InteractionConfig {
    /// Line endpoints snap to `1 / snap_divisions` of a cell.
    pub snap_divisions: u32,
    /// Pointer travel (screen pixels) below which a press counts as a click.
    pub click_threshold: f64,
    /// Maximum distance (screen pixels) at which a click removes a line.
    pub hit_tolerance: f64,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            snap_divisions: 2,
            click_threshold: 5.0,
            hit_tolerance: 5.0,
        }
    }
}

impl InteractionConfig {
    /// Snap unit in grid units.
    pub fn snap_unit(&self) -> f64 {
        1.0 / f64::from(self.snap_divisions.max(1))
    }
}

/// Stroke widths used by the compositor, in surface pixels at zoom 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    pub grid_line_width: f64,
    pub guide_line_width: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            grid_line_width: 1.0,
            guide_line_width: 2.0,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub viewport: ViewportConfig,
    pub interaction: InteractionConfig,
    pub render: RenderConfig,
}

impl EngineConfig {
    /// Parse a config from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Serialize the config to JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            EngineConfig::from_json(r#"{"interaction": {"snapDivisions": 4}}"#).unwrap();
        assert_eq!(config.interaction.snap_divisions, 4);
        assert!((config.interaction.snap_unit() - 0.25).abs() < f64::EPSILON);
        assert_eq!(config.interaction.click_threshold, 5.0);
        assert_eq!(config.viewport, ViewportConfig::default());
    }

    #[test]
    fn test_snap_unit_never_divides_by_zero() {
        let config = InteractionConfig {
            snap_divisions: 0,
            ..Default::default()
        };
        assert_eq!(config.snap_unit(), 1.0);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            EngineConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_and_present() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stitchgrid.json");
        assert_eq!(EngineConfig::load(&path).unwrap(), EngineConfig::default());

        let mut config = EngineConfig::default();
        config.viewport.padding = 20.0;
        std::fs::write(&path, config.to_json().unwrap()).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }
}
