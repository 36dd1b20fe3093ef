use std::io::Write;

use subzoom_core::config::{
    AnimationConfig, GestureConfig, TileConfig, ViewerConfig, ZoomConfig,
};
use subzoom_core::error::SubsamplingError;

#[test]
fn test_default_config_round_trips_through_toml() {
    let text = ViewerConfig::default().to_toml_string().unwrap();
    assert!(text.contains("[zoom]"));
    assert!(text.contains("slice_threshold = 640"));

    let parsed = ViewerConfig::from_toml_str(&text).unwrap();
    assert_eq!(parsed.zoom, ZoomConfig::default());
    assert_eq!(parsed.tiles, TileConfig::default());
    assert_eq!(parsed.gesture, GestureConfig::default());
    assert_eq!(parsed.animation, AnimationConfig::default());
}

#[test]
fn test_partial_config_keeps_defaults() {
    let config = ViewerConfig::from_toml_str(
        "[zoom]\nmax_zoom_scale = 8.0\n\n[tiles]\nmax_pool_entries = 64\n",
    )
    .unwrap();
    assert_eq!(config.zoom.max_zoom_scale, 8.0);
    assert_eq!(config.zoom.min_zoom_scale, 1.0);
    assert_eq!(config.zoom.double_tap_zoom_scale, 2.0);
    assert_eq!(config.tiles.max_pool_entries, Some(64));
    assert_eq!(config.tiles.slice_threshold, 640);
    assert_eq!(config.gesture, GestureConfig::default());

    let empty = ViewerConfig::from_toml_str("").unwrap();
    assert_eq!(empty.tiles.max_pool_entries, None);
}

#[test]
fn test_invalid_scale_limits_are_rejected() {
    let unit_double_tap = ViewerConfig::from_toml_str("[zoom]\ndouble_tap_zoom_scale = 1.0\n");
    assert!(matches!(
        unit_double_tap,
        Err(SubsamplingError::InvalidScaleLimits(_))
    ));

    let inverted = ViewerConfig::from_toml_str("[zoom]\nmin_zoom_scale = 3.0\n");
    assert!(matches!(inverted, Err(SubsamplingError::InvalidScaleLimits(_))));

    let zero = ZoomConfig {
        min_zoom_scale: 0.0,
        ..Default::default()
    };
    assert!(zero.validate().is_err());

    // Zooming out below 1 is allowed as long as the ordering holds.
    let wide = ZoomConfig {
        min_zoom_scale: 0.5,
        max_zoom_scale: 10.0,
        double_tap_zoom_scale: 3.0,
    };
    assert!(wide.validate().is_ok());
}

#[test]
fn test_invalid_tile_config_is_rejected() {
    for text in [
        "[tiles]\nslice_threshold = 0\n",
        "[tiles]\ntile_overlap_scale = 0.0\n",
        "[tiles]\npreview_pixel_budget = 0\n",
        "[tiles]\ntile_overlap_scale = nan\n",
        "[tiles]\ntile_overlap_scale = inf\n",
        "[tiles]\ndisplay_source_threshold = -1.0\n",
        "[tiles]\ndisplay_source_threshold = nan\n",
    ] {
        assert!(
            matches!(ViewerConfig::from_toml_str(text), Err(SubsamplingError::Config(_))),
            "accepted {text:?}"
        );
    }
}

#[test]
fn test_tile_config_rejects_non_finite_values_built_in_code() {
    let nan_overlap = TileConfig {
        tile_overlap_scale: f64::NAN,
        ..Default::default()
    };
    assert!(matches!(nan_overlap.validate(), Err(SubsamplingError::Config(_))));

    let zero_threshold = TileConfig {
        display_source_threshold: 0.0,
        ..Default::default()
    };
    assert!(matches!(zero_threshold.validate(), Err(SubsamplingError::Config(_))));

    let infinite_threshold = TileConfig {
        display_source_threshold: f64::INFINITY,
        ..Default::default()
    };
    assert!(infinite_threshold.validate().is_err());

    assert!(TileConfig::default().validate().is_ok());
}

#[test]
fn test_malformed_toml_is_a_config_error() {
    let result = ViewerConfig::from_toml_str("[zoom\nmax_zoom_scale = ");
    assert!(matches!(result, Err(SubsamplingError::Config(_))));

    let wrong_type = ViewerConfig::from_toml_str("[tiles]\nslice_threshold = \"big\"\n");
    assert!(matches!(wrong_type, Err(SubsamplingError::Config(_))));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[gesture]\ntouch_slop = 12.5").unwrap();
    let config = ViewerConfig::load(file.path()).unwrap();
    assert_eq!(config.gesture.touch_slop, 12.5);
    assert_eq!(config.gesture.double_tap_timeout_ms, 300);

    let missing = ViewerConfig::load(std::path::Path::new("/nonexistent/subzoom.toml"));
    assert!(matches!(missing, Err(SubsamplingError::Io(_))));
}
