//! Engine Configuration - Immutable context passed through every call
//!
//! All lengths are points; they go through `RenderSurface::scale_by_dpi`
//! before they are compared with measured pixels.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default)]
    pub fit: FitConfig,
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub markup: MarkupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FitConfig {
    /// Font size decrement per iteration, in points.
    #[serde(default = "default_step")]
    pub step: f64,
    /// Margin kept between text and the bottom of its reference region.
    #[serde(default = "default_padding")]
    pub padding_pts: f64,
    /// Shrink loops never go below this size.
    #[serde(default = "default_min_font_size")]
    pub min_font_size: f64,
    /// Clearance kept between a line of text and an obstacle to its right.
    #[serde(default = "default_overlap_gap")]
    pub overlap_gap_pts: f64,
    #[serde(default = "default_baseline_shift_ratio")]
    pub baseline_shift_ratio: f64,
    /// Clearance kept above an obstacle when nudging blocks.
    #[serde(default = "default_obstacle_gap")]
    pub obstacle_gap_pts: f64,
    #[serde(default = "default_max_nudge_iterations")]
    pub max_nudge_iterations: u32,
}

fn default_step() -> f64 { 0.4 }
fn default_padding() -> f64 { 15.36 }
fn default_min_font_size() -> f64 { 4.0 }
fn default_overlap_gap() -> f64 { 7.2 }
fn default_baseline_shift_ratio() -> f64 { 0.3 }
fn default_obstacle_gap() -> f64 { 2.4 }
fn default_max_nudge_iterations() -> u32 { 64 }

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            step: default_step(),
            padding_pts: default_padding(),
            min_font_size: default_min_font_size(),
            overlap_gap_pts: default_overlap_gap(),
            baseline_shift_ratio: default_baseline_shift_ratio(),
            obstacle_gap_pts: default_obstacle_gap(),
            max_nudge_iterations: default_max_nudge_iterations(),
        }
    }
}

impl FitConfig {
    pub fn half_step(&self) -> f64 {
        self.step / 2.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameConfig {
    /// Largest color count still drawn as a literal combination (pair or
    /// triple) instead of the gold slot. Clamped to 1..=3.
    #[serde(default = "default_multicolor_limit")]
    pub multicolor_limit: u8,
}

fn default_multicolor_limit() -> u8 { 2 }

impl Default for FrameConfig {
    fn default() -> Self {
        Self { multicolor_limit: default_multicolor_limit() }
    }
}

impl FrameConfig {
    pub fn limit(&self) -> usize {
        usize::from(self.multicolor_limit.clamp(1, 3))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkupConfig {
    /// Strings italicized wherever they appear, in addition to reminder text,
    /// ability words and flavor text.
    #[serde(default)]
    pub extra_italics: Vec<String>,
    /// Strip reminder text from rules text before layout.
    #[serde(default)]
    pub strip_reminder: bool,
}

impl EngineConfig {
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if !(self.fit.step > 0.0) {
            return Err(ConfigError::Invalid {
                field: "fit.step",
                reason: format!("must be positive, got {}", self.fit.step),
            });
        }
        if !(self.fit.min_font_size > 0.0) {
            return Err(ConfigError::Invalid {
                field: "fit.minFontSize",
                reason: format!("must be positive, got {}", self.fit.min_font_size),
            });
        }
        if self.fit.max_nudge_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "fit.maxNudgeIterations",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config.fit.step, 0.4);
        assert_eq!(config.fit.half_step(), 0.2);
        assert_eq!(config.frame.limit(), 2);
        assert!(config.markup.extra_italics.is_empty());
    }

    #[test]
    fn test_partial_override() {
        let config = EngineConfig::from_json_str(
            r#"{"fit": {"step": 0.2, "minFontSize": 6}, "frame": {"multicolorLimit": 3}}"#,
        )
        .unwrap();
        assert_eq!(config.fit.step, 0.2);
        assert_eq!(config.fit.min_font_size, 6.0);
        assert_eq!(config.fit.max_nudge_iterations, 64);
        assert_eq!(config.frame.limit(), 3);
    }

    #[test]
    fn test_multicolor_limit_clamped() {
        let frame = FrameConfig { multicolor_limit: 9 };
        assert_eq!(frame.limit(), 3);
        let frame = FrameConfig { multicolor_limit: 0 };
        assert_eq!(frame.limit(), 1);
    }

    #[test]
    fn test_rejects_non_positive_step() {
        let err = EngineConfig::from_json_str(r#"{"fit": {"step": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("fit.step"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        fs::write(&path, r#"{"markup": {"extraItalics": ["Boast"]}}"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.markup.extra_italics, vec!["Boast".to_string()]);
    }
}
