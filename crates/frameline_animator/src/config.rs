// SPDX-License-Identifier: MIT OR Apache-2.0
//! Animator configuration.

use crate::error::{AnimatorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current config format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Frame rate used when neither the clip nor the host provides one
pub const DEFAULT_FALLBACK_FPS: f64 = 15.0;

/// How label-driven clips are addressed while playing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Addressing {
    /// Seconds, frame-rate independent
    #[default]
    Time,
    /// Integer frames, one step per host tick
    Frames,
}

/// Animator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    /// Format version
    pub version: u32,
    /// Alias used to subscribe to the host update source
    pub update_alias: String,
    /// Default addressing for clips
    pub addressing: Addressing,
    /// Engine-wide frame dropping for frame-addressed clips
    pub use_frame_dropping: bool,
    /// Host target frame rate
    pub host_fps: f64,
    /// Last-resort clip frame rate
    pub fallback_fps: f64,
    /// Seed for random start positions
    pub random_seed: Option<u64>,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            update_alias: "Animator".to_string(),
            addressing: Addressing::Time,
            use_frame_dropping: false,
            host_fps: 60.0,
            fallback_fps: DEFAULT_FALLBACK_FPS,
            random_seed: None,
        }
    }
}

impl AnimatorConfig {
    /// Parse from RON
    pub fn from_ron(content: &str) -> Result<Self> {
        let config: AnimatorConfig = ron::from_str(content)?;
        if config.version > CONFIG_FORMAT_VERSION {
            return Err(AnimatorError::UnsupportedConfigVersion {
                found: config.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }
        Ok(config)
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String> {
        let pretty = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, pretty)?)
    }

    /// Load from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Save to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    /// Frame rate for a clip, given what the clip reports
    pub fn resolve_fps(&self, clip_fps: Option<f64>) -> f64 {
        [clip_fps, Some(self.host_fps), Some(self.fallback_fps)]
            .into_iter()
            .flatten()
            .find(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(DEFAULT_FALLBACK_FPS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnimatorConfig::default();
        assert_eq!(config.update_alias, "Animator");
        assert_eq!(config.addressing, Addressing::Time);
        assert!(!config.use_frame_dropping);
    }

    #[test]
    fn test_round_trip_keeps_overrides() {
        let config = AnimatorConfig {
            addressing: Addressing::Frames,
            use_frame_dropping: true,
            random_seed: Some(7),
            ..Default::default()
        };
        let loaded = AnimatorConfig::from_ron(&config.to_ron().unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = AnimatorConfig::from_ron("(host_fps: 30.0)").unwrap();
        assert_eq!(config.host_fps, 30.0);
        assert_eq!(config.update_alias, "Animator");
    }

    #[test]
    fn test_newer_version_rejected() {
        let result = AnimatorConfig::from_ron("(version: 99)");
        assert!(matches!(
            result,
            Err(AnimatorError::UnsupportedConfigVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_fps_fallback_chain() {
        let config = AnimatorConfig {
            host_fps: 0.0,
            ..Default::default()
        };
        assert_eq!(config.resolve_fps(Some(24.0)), 24.0);
        assert_eq!(config.resolve_fps(None), DEFAULT_FALLBACK_FPS);
        assert_eq!(config.resolve_fps(Some(f64::NAN)), DEFAULT_FALLBACK_FPS);
        assert_eq!(AnimatorConfig::default().resolve_fps(None), 60.0);
    }
}
