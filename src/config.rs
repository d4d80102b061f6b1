//! Recents configuration
//!
//! Loaded from `recents.toml`. Every field has a default so a partial (or
//! missing) file works; a file that exists but does not parse is an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gesture: GestureConfig,
    pub end_target: EndTargetThresholds,
    pub animation: AnimationConfig,
    pub display: DisplayConfig,
}

/// Touch classification tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Movement before a touch stops being a potential tap (px)
    pub touch_slop: f64,
    /// Longest press that still counts as a tap (ms)
    pub tap_timeout_ms: u64,
    /// Height (or width, in a vertical bar layout) of the nav bar (px)
    pub nav_bar_size: f64,
    /// Width of the reserved back-gesture zones on the left and right edges (px)
    pub back_edge_width: f64,
    /// Height of the strip above the bottom edge where a touch is deferred
    /// until it proves to be a gesture (px)
    pub deferred_region_height: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_slop: 16.0,
            tap_timeout_ms: 200,
            nav_bar_size: 96.0,
            back_edge_width: 24.0,
            deferred_region_height: 24.0,
        }
    }
}

impl GestureConfig {
    pub fn tap_timeout(&self) -> Duration {
        Duration::from_millis(self.tap_timeout_ms)
    }
}

/// Tie-break constants for end-target resolution.
///
/// Velocities are in px/s along the display frame, distances in px,
/// progress is the fraction of the swipe-up travel length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndTargetThresholds {
    /// Vertical speed above which velocity decides over position
    pub fling_velocity: f64,
    /// Upward speed above which a fully-gestural swipe goes home
    pub home_fling_velocity: f64,
    /// Horizontal travel that turns a swipe into a quick switch
    pub quick_switch_distance: f64,
    /// Progress at or above which a slow swipe settles in recents
    pub recents_progress: f64,
    /// Progress at or above which a slow, fully-gestural swipe goes home
    pub home_progress: f64,
}

impl Default for EndTargetThresholds {
    fn default() -> Self {
        Self {
            fling_velocity: 1000.0,
            home_fling_velocity: 4000.0,
            quick_switch_distance: 120.0,
            recents_progress: 0.5,
            home_progress: 1.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Duration of an animated state change (ms)
    pub transition_ms: u64,
    /// Duration of the settle animation after the finger lifts (ms)
    pub settle_ms: u64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            transition_ms: 250,
            settle_ms: 300,
        }
    }
}

impl AnimationConfig {
    pub fn transition_duration(&self) -> Duration {
        Duration::from_millis(self.transition_ms)
    }

    pub fn settle_duration(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Width in the natural orientation (px)
    pub width: i32,
    /// Height in the natural orientation (px)
    pub height: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            width: 720,
            height: 1440,
        }
    }
}

impl Config {
    /// Default config file location (`$XDG_CONFIG_HOME/flick/recents.toml`)
    pub fn default_path() -> Option<PathBuf> {
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".config")))
            .ok()
            .map(|dir| dir.join("flick/recents.toml"))
    }

    /// Load from an explicit path, or the default location.
    /// A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => return Ok(Self::default()),
        };

        match fs::read_to_string(&path) {
            Ok(contents) => {
                let config = Self::from_toml(&contents)?;
                tracing::info!("Loaded recents config from {:?}", path);
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No recents config at {:?}, using defaults", path);
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [end_target]
            fling_velocity = 800.0

            [display]
            width = 1080
            "#,
        )
        .unwrap();

        assert_eq!(config.end_target.fling_velocity, 800.0);
        assert_eq!(config.end_target.home_progress, EndTargetThresholds::default().home_progress);
        assert_eq!(config.display.width, 1080);
        assert_eq!(config.display.height, 1440);
        assert_eq!(config.gesture, GestureConfig::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let err = Config::from_toml("[gesture]\ntouch_slop = \"far\"").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/flick/recents.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }
}
