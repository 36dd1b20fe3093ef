#[allow(dead_code)]
mod common;

use std::time::Duration;

use kurbo::{Point, Rect, Vec2};
use subzoom_core::config::ZoomConfig;
use subzoom_core::error::SubsamplingError;
use subzoom_core::gesture::GestureEvent;
use subzoom_core::transform::Transform;
use subzoom_core::zoom::{GestureSource, ZoomState};

use common::zoom_with_layout;

const FRAME: Duration = Duration::from_millis(16);

fn settle(zoom: &mut ZoomState) -> usize {
    for frame in 0..600 {
        if !zoom.tick(FRAME) {
            return frame;
        }
    }
    panic!("zoom state never settled");
}

/// Zoom about the layout center with a gesture and let the recenter run.
fn zoomed_square(scale: f64) -> ZoomState {
    let mut zoom = zoom_with_layout(1000.0, 1000.0, 1.0);
    zoom.on_gesture(Point::new(500.0, 500.0), Vec2::ZERO, scale, GestureSource::Gesture);
    zoom.on_gesture_end(Vec2::ZERO);
    settle(&mut zoom);
    zoom
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn test_default_state_is_identity() {
    let zoom = ZoomState::default();
    assert_eq!(zoom.transform(), Transform::IDENTITY);
    assert!(!zoom.is_animating());
}

#[test]
fn test_invalid_scale_limits_fail_fast() {
    let inverted = ZoomConfig {
        min_zoom_scale: 2.0,
        max_zoom_scale: 1.0,
        double_tap_zoom_scale: 1.5,
    };
    assert!(matches!(
        ZoomState::new(&inverted),
        Err(SubsamplingError::InvalidScaleLimits(_))
    ));

    let unit_double_tap = ZoomConfig {
        min_zoom_scale: 0.5,
        max_zoom_scale: 4.0,
        double_tap_zoom_scale: 1.0,
    };
    assert!(ZoomState::new(&unit_double_tap).is_err());

    let zero_min = ZoomConfig {
        min_zoom_scale: 0.0,
        ..ZoomConfig::default()
    };
    assert!(ZoomState::new(&zero_min).is_err());
}

#[test]
fn test_scale_limits_only_widen() {
    let mut zoom = ZoomState::default();
    zoom.set_scale_limits(1.0, 8.0, 2.0).unwrap();
    assert!((zoom.max_zoom_scale() - 8.0).abs() < 1e-12);
    assert!(zoom.set_scale_limits(1.0, 4.0, 2.0).is_err());
    assert!((zoom.max_zoom_scale() - 8.0).abs() < 1e-12);
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[test]
fn test_content_bounds_letterboxed() {
    let zoom = zoom_with_layout(1000.0, 1000.0, 4.0 / 3.0);
    let bounds = zoom.content_bounds();
    assert!((bounds.x0 - 0.0).abs() < 1e-9);
    assert!((bounds.y0 - 125.0).abs() < 1e-9);
    assert!((bounds.width() - 1000.0).abs() < 1e-9);
    assert!((bounds.height() - 750.0).abs() < 1e-9);
}

#[test]
fn test_content_bounds_pillarboxed() {
    let zoom = zoom_with_layout(1000.0, 500.0, 1.0);
    let bounds = zoom.content_bounds();
    assert!((bounds.x0 - 250.0).abs() < 1e-9);
    assert!((bounds.width() - 500.0).abs() < 1e-9);
    assert!((bounds.height() - 500.0).abs() < 1e-9);
}

#[test]
fn test_unknown_aspect_ratio_fills_layout() {
    let zoom = zoom_with_layout(800.0, 600.0, 0.0);
    assert_eq!(zoom.content_bounds(), Rect::new(0.0, 0.0, 800.0, 600.0));
}

#[test]
fn test_transformed_bounds_follow_scale() {
    let zoom = zoomed_square(2.0);
    let bounds = zoom.transformed_content_bounds();
    assert!((bounds.width() - 2000.0).abs() < 1e-6);
    assert!((bounds.center().x - 500.0).abs() < 1e-6);
}

// ---------------------------------------------------------------------------
// Gestures
// ---------------------------------------------------------------------------

#[test]
fn test_gesture_zoom_clamped_to_limits() {
    let mut zoom = zoom_with_layout(1000.0, 1000.0, 1.0);
    zoom.on_gesture(Point::new(500.0, 500.0), Vec2::ZERO, 10.0, GestureSource::Gesture);
    assert!((zoom.scale() - 4.0).abs() < 1e-12);
    zoom.on_gesture(Point::new(500.0, 500.0), Vec2::ZERO, 0.01, GestureSource::Gesture);
    assert!((zoom.scale() - 1.0).abs() < 1e-12);
}

#[test]
fn test_pre_zoom_reports_acceptable_change() {
    let zoom = zoomed_square(3.0);
    assert!((zoom.pre_zoom(2.0) - 4.0 / 3.0).abs() < 1e-12);
    assert!((zoom.pre_zoom(0.1) - 1.0 / 3.0).abs() < 1e-12);
    assert!((ZoomState::default().pre_zoom(0.5) - 1.0).abs() < 1e-12);
}

#[test]
fn test_pan_refused_at_default_scale() {
    let zoom = zoom_with_layout(1000.0, 1000.0, 1.0);
    assert_eq!(zoom.pre_pan(Vec2::new(50.0, -20.0)), Vec2::ZERO);
}

#[test]
fn test_pan_clamped_to_content_edges() {
    let zoom = zoomed_square(2.0);
    let restriction = zoom.resting_pan_restriction();
    assert!((restriction.x0 + 500.0).abs() < 1e-6);
    assert!((restriction.x1 - 500.0).abs() < 1e-6);

    let consumed = zoom.pre_pan(Vec2::new(800.0, -900.0));
    assert!((consumed.x - 500.0).abs() < 1e-6);
    assert!((consumed.y + 500.0).abs() < 1e-6);
}

#[test]
fn test_pan_refused_on_axis_narrower_than_layout() {
    // 2:1 content in a square layout: at scale 1.5 the content is 750 tall.
    let mut zoom = zoom_with_layout(1000.0, 1000.0, 2.0);
    zoom.on_gesture(Point::new(500.0, 500.0), Vec2::ZERO, 1.5, GestureSource::Gesture);
    zoom.on_gesture_end(Vec2::ZERO);
    settle(&mut zoom);
    let consumed = zoom.pre_pan(Vec2::new(100.0, 100.0));
    assert!((consumed.x - 100.0).abs() < 1e-6);
    assert_eq!(consumed.y, 0.0);
}

#[test]
fn test_zoom_gesture_end_recenters_into_bounds() {
    let mut zoom = zoom_with_layout(1000.0, 1000.0, 1.0);
    // Relaxed while gesture zooming, so the overshoot is accepted first.
    zoom.on_gesture(Point::new(500.0, 500.0), Vec2::new(900.0, 0.0), 2.0, GestureSource::Gesture);
    assert!((zoom.transform().translation_x - 900.0).abs() < 1e-6);

    zoom.on_gesture_end(Vec2::new(3000.0, 0.0));
    assert!(zoom.is_recentering());
    assert!(!zoom.is_flinging());
    settle(&mut zoom);
    assert!((zoom.transform().translation_x - 500.0).abs() < 1.0);
}

#[test]
fn test_fling_moves_then_stops_inside_bounds() {
    let mut zoom = zoomed_square(2.0);
    zoom.on_gesture_end(Vec2::new(-2000.0, 0.0));
    assert!(zoom.is_flinging());
    settle(&mut zoom);
    let t = zoom.transform().translation();
    assert!(t.x < -100.0);
    assert!(t.x >= -500.0 - 1e-6);
    assert!(t.y.abs() < 1e-9);
}

#[test]
fn test_slow_release_does_not_fling() {
    let mut zoom = zoomed_square(2.0);
    zoom.on_gesture_end(Vec2::new(0.5, -0.5));
    assert!(!zoom.is_flinging());
}

#[test]
fn test_apply_gesture_refuses_pan_at_rest() {
    let mut zoom = zoom_with_layout(1000.0, 1000.0, 1.0);
    let consumed = zoom.apply_gesture(&GestureEvent::Transform {
        centroid: Point::new(500.0, 500.0),
        pan: Vec2::new(30.0, 0.0),
        zoom: 1.0,
        rotation: 0.0,
    });
    assert!(!consumed);
    assert!(!zoom.apply_gesture(&GestureEvent::Tap {
        position: Point::new(10.0, 10.0)
    }));
}

#[test]
fn test_apply_gesture_zooms() {
    let mut zoom = zoom_with_layout(1000.0, 1000.0, 1.0);
    assert!(zoom.apply_gesture(&GestureEvent::Transform {
        centroid: Point::new(500.0, 500.0),
        pan: Vec2::ZERO,
        zoom: 1.08,
        rotation: 0.0,
    }));
    assert!((zoom.scale() - 1.08).abs() < 1e-12);
    assert!(zoom.is_gesture_zooming());
    assert!(zoom.apply_gesture(&GestureEvent::End {
        velocity: Vec2::ZERO
    }));
    assert!(!zoom.is_gesture_zooming());
}

// ---------------------------------------------------------------------------
// Double tap
// ---------------------------------------------------------------------------

#[test]
fn test_double_tap_keeps_tapped_point_fixed() {
    let mut zoom = zoom_with_layout(1000.0, 1000.0, 1.0);
    let tap = Point::new(400.0, 450.0);
    zoom.on_double_tap(tap);
    assert!(zoom.is_zoom_animating());

    for _ in 0..600 {
        let animating = zoom.tick(FRAME);
        let under_tap = zoom.matrix().inverse() * tap;
        assert!((under_tap - tap).hypot() < 1e-6);
        if !animating {
            break;
        }
    }
    assert!((zoom.scale() - 2.0).abs() < 1e-12);
    assert!(!zoom.is_animating());
}

#[test]
fn test_double_tap_on_letterboxed_content_fills_layout() {
    // 2:1 content occupies y 250..750; zoomed 2x it is exactly as tall as the layout.
    let mut zoom = zoom_with_layout(1000.0, 1000.0, 2.0);
    zoom.on_double_tap(Point::new(500.0, 300.0));
    settle(&mut zoom);
    let bounds = zoom.transformed_content_bounds();
    assert!(bounds.y0.abs() < 1e-6);
    assert!((bounds.y1 - 1000.0).abs() < 1e-6);
    assert!((bounds.x0 + 500.0).abs() < 1e-6);
}

#[test]
fn test_double_tap_when_zoomed_returns_to_identity() {
    let mut zoom = zoomed_square(3.0);
    zoom.on_double_tap(Point::new(200.0, 200.0));
    settle(&mut zoom);
    assert_eq!(zoom.transform(), Transform::IDENTITY);
}

#[test]
fn test_gesture_cancels_double_tap_animation() {
    let mut zoom = zoom_with_layout(1000.0, 1000.0, 1.0);
    zoom.on_double_tap(Point::new(500.0, 500.0));
    zoom.tick(FRAME);
    zoom.on_gesture(Point::new(500.0, 500.0), Vec2::ZERO, 1.05, GestureSource::Gesture);
    assert!(!zoom.is_zoom_animating());
}

#[test]
fn test_fling_cannot_preempt_zoom_animation() {
    let mut zoom = zoomed_square(2.0);
    zoom.on_double_tap(Point::new(500.0, 500.0));
    let before = zoom.transform();
    assert!(!zoom.on_gesture(Point::ORIGIN, Vec2::new(10.0, 0.0), 1.0, GestureSource::Fling));
    assert_eq!(zoom.transform(), before);
}

// ---------------------------------------------------------------------------
// Source arbitration
// ---------------------------------------------------------------------------

#[test]
fn test_source_preemption_order() {
    use GestureSource::*;
    let order = [Gesture, DoubleTap, AnimateCenter, Fling];
    for (i, a) in order.iter().enumerate() {
        for (j, b) in order.iter().enumerate() {
            assert_eq!(a.preempts(*b), i < j, "{a} over {b}");
        }
    }
}

#[test]
fn test_double_tap_source_cancels_recenter() {
    let mut zoom = zoom_with_layout(1000.0, 1000.0, 1.0);
    zoom.on_gesture(Point::new(500.0, 500.0), Vec2::new(900.0, 0.0), 2.0, GestureSource::Gesture);
    zoom.on_gesture_end(Vec2::ZERO);
    assert!(zoom.is_recentering());

    // A lower priority source is refused while the recenter owns the transform.
    let before = zoom.transform();
    assert!(!zoom.on_gesture(Point::ORIGIN, Vec2::new(-10.0, 0.0), 1.0, GestureSource::Fling));
    assert_eq!(zoom.transform(), before);
    assert!(zoom.is_recentering());

    assert!(zoom.on_gesture(Point::new(500.0, 500.0), Vec2::ZERO, 3.0, GestureSource::DoubleTap));
    assert!(!zoom.is_recentering());
    assert!((zoom.scale() - 3.0).abs() < 1e-12);
}

#[test]
fn test_recenter_source_refused_during_double_tap_animation() {
    let mut zoom = zoom_with_layout(1000.0, 1000.0, 1.0);
    zoom.on_double_tap(Point::new(500.0, 500.0));
    zoom.tick(FRAME);
    let before = zoom.transform();
    assert!(!zoom.on_gesture(
        Point::new(500.0, 500.0),
        Vec2::new(10.0, 0.0),
        1.0,
        GestureSource::AnimateCenter
    ));
    assert_eq!(zoom.transform(), before);
    assert!(zoom.is_zoom_animating());
}

#[test]
fn test_gesture_cancels_fling() {
    let mut zoom = zoomed_square(2.0);
    zoom.on_gesture_end(Vec2::new(-2000.0, 0.0));
    assert!(zoom.is_flinging());
    zoom.on_gesture(Point::new(500.0, 500.0), Vec2::new(5.0, 0.0), 1.0, GestureSource::Gesture);
    assert!(!zoom.is_flinging());
}
