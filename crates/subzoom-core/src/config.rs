use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{
    CENTER_ANIMATION_DELAY_MS, CENTER_SPRING_DAMPING_RATIO, CENTER_SPRING_STIFFNESS,
    DISPLAY_SOURCE_THRESHOLD, DOUBLE_TAP_MIN_TIME_MS, DOUBLE_TAP_SLOP, DOUBLE_TAP_TIMEOUT_MS,
    DOUBLE_TAP_ZOOM_SCALE, DEFAULT_TOUCH_SLOP, FLING_FRICTION, MAX_FLING_VELOCITY,
    MAX_ZOOM_SCALE, MIN_ZOOM_SCALE, PREVIEW_PIXEL_BUDGET, SLICE_THRESHOLD, TILE_OVERLAP_SCALE,
    ZOOM_SPRING_DAMPING_RATIO, ZOOM_SPRING_STIFFNESS, ZOOM_SPRING_VISIBILITY_THRESHOLD,
};
use crate::error::{Result, SubsamplingError};

/// Full viewer configuration, as read from a TOML file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub zoom: ZoomConfig,
    #[serde(default)]
    pub tiles: TileConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
}

impl ViewerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: ViewerConfig =
            toml::from_str(contents).map_err(|e| SubsamplingError::Config(e.to_string()))?;
        config.zoom.validate()?;
        config.tiles.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SubsamplingError::Config(e.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub min_zoom_scale: f64,
    pub max_zoom_scale: f64,
    pub double_tap_zoom_scale: f64,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min_zoom_scale: MIN_ZOOM_SCALE,
            max_zoom_scale: MAX_ZOOM_SCALE,
            double_tap_zoom_scale: DOUBLE_TAP_ZOOM_SCALE,
        }
    }
}

impl ZoomConfig {
    /// Check `0 < min <= double <= max` and `double != 1`.
    pub fn validate(&self) -> Result<()> {
        validate_scale_limits(
            self.min_zoom_scale,
            self.max_zoom_scale,
            self.double_tap_zoom_scale,
        )
    }
}

pub(crate) fn validate_scale_limits(min: f64, max: f64, double: f64) -> Result<()> {
    if double == 1.0 {
        return Err(SubsamplingError::InvalidScaleLimits(format!(
            "double_tap_zoom_scale ({double}) must not be 1"
        )));
    }
    if !(0.0 < min && min <= double && double <= max) {
        return Err(SubsamplingError::InvalidScaleLimits(format!(
            "expected 0 < min_zoom_scale={min} <= double_tap_zoom_scale={double} <= max_zoom_scale={max}"
        )));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// Largest on-screen tile edge before the grid is split again.
    pub slice_threshold: u32,
    /// Layout bounds are scaled by this before tile visibility tests.
    pub tile_overlap_scale: f64,
    /// Below this transformed-to-preview ratio only the preview is painted.
    pub display_source_threshold: f64,
    /// Pixel budget of a preview derived from the source decoder.
    pub preview_pixel_budget: u64,
    /// Cap on pooled tile identities. `None` keeps every identity ever created.
    pub max_pool_entries: Option<usize>,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            slice_threshold: SLICE_THRESHOLD,
            tile_overlap_scale: TILE_OVERLAP_SCALE,
            display_source_threshold: DISPLAY_SOURCE_THRESHOLD,
            preview_pixel_budget: PREVIEW_PIXEL_BUDGET,
            max_pool_entries: None,
        }
    }
}

impl TileConfig {
    pub fn validate(&self) -> Result<()> {
        if self.slice_threshold == 0 {
            return Err(SubsamplingError::Config(
                "slice_threshold must be positive".into(),
            ));
        }
        for (name, value) in [
            ("tile_overlap_scale", self.tile_overlap_scale),
            ("display_source_threshold", self.display_source_threshold),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(SubsamplingError::Config(format!(
                    "{name} ({value}) must be a positive finite number"
                )));
            }
        }
        if self.preview_pixel_budget == 0 {
            return Err(SubsamplingError::Config(
                "preview_pixel_budget must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub touch_slop: f64,
    pub double_tap_timeout_ms: u64,
    pub double_tap_min_time_ms: u64,
    pub double_tap_slop: f64,
    pub max_fling_velocity: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_slop: DEFAULT_TOUCH_SLOP,
            double_tap_timeout_ms: DOUBLE_TAP_TIMEOUT_MS,
            double_tap_min_time_ms: DOUBLE_TAP_MIN_TIME_MS,
            double_tap_slop: DOUBLE_TAP_SLOP,
            max_fling_velocity: MAX_FLING_VELOCITY,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub zoom_stiffness: f64,
    pub zoom_damping_ratio: f64,
    pub zoom_visibility_threshold: f64,
    pub center_stiffness: f64,
    pub center_damping_ratio: f64,
    pub center_delay_ms: u64,
    /// Exponential decay rate of fling velocity, per second.
    pub fling_friction: f64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            zoom_stiffness: ZOOM_SPRING_STIFFNESS,
            zoom_damping_ratio: ZOOM_SPRING_DAMPING_RATIO,
            zoom_visibility_threshold: ZOOM_SPRING_VISIBILITY_THRESHOLD,
            center_stiffness: CENTER_SPRING_STIFFNESS,
            center_damping_ratio: CENTER_SPRING_DAMPING_RATIO,
            center_delay_ms: CENTER_ANIMATION_DELAY_MS,
            fling_friction: FLING_FRICTION,
        }
    }
}
