use approx::assert_abs_diff_eq;
use kurbo::{Point, Vec2};
use subzoom_core::config::GestureConfig;
use subzoom_core::gesture::{GestureDetector, GestureEvent, PointerEvent, PointerPhase};

fn down(id: u64, x: f64, y: f64, t: u64) -> PointerEvent {
    PointerEvent::new(id, PointerPhase::Down, Point::new(x, y), t)
}

fn moved(id: u64, x: f64, y: f64, t: u64) -> PointerEvent {
    PointerEvent::new(id, PointerPhase::Move, Point::new(x, y), t)
}

fn up(id: u64, x: f64, y: f64, t: u64) -> PointerEvent {
    PointerEvent::new(id, PointerPhase::Up, Point::new(x, y), t)
}

fn detector() -> GestureDetector {
    GestureDetector::new(GestureConfig::default())
}

fn transforms(events: &[GestureEvent]) -> Vec<(Point, Vec2, f64, f64)> {
    events
        .iter()
        .filter_map(|e| match *e {
            GestureEvent::Transform {
                centroid,
                pan,
                zoom,
                rotation,
            } => Some((centroid, pan, zoom, rotation)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_single_tap_waits_for_double_tap_window() {
    let mut g = detector();
    assert!(g.process(&[down(1, 100.0, 100.0, 0)]).is_empty());
    assert!(g.is_active());
    let out = g.process(&[up(1, 100.0, 100.0, 50)]);
    assert_eq!(out, vec![GestureEvent::End { velocity: Vec2::ZERO }]);
    assert!(!g.is_active());

    assert_eq!(g.poll(200), None);
    assert_eq!(
        g.poll(351),
        Some(GestureEvent::Tap {
            position: Point::new(100.0, 100.0)
        })
    );
    assert_eq!(g.poll(1000), None);
}

#[test]
fn test_double_tap() {
    let mut g = detector();
    g.process(&[down(1, 100.0, 100.0, 0)]);
    g.process(&[up(1, 100.0, 100.0, 50)]);
    assert!(g.process(&[down(2, 110.0, 105.0, 120)]).is_empty());
    let out = g.process(&[up(2, 110.0, 105.0, 170)]);
    assert!(out.contains(&GestureEvent::DoubleTap {
        position: Point::new(110.0, 105.0)
    }));
    assert!(!out.iter().any(|e| matches!(e, GestureEvent::Tap { .. })));
    assert_eq!(g.poll(1000), None);
}

#[test]
fn test_late_second_down_reports_first_tap() {
    let mut g = detector();
    g.process(&[down(1, 100.0, 100.0, 0)]);
    g.process(&[up(1, 100.0, 100.0, 50)]);
    let out = g.process(&[down(2, 100.0, 100.0, 400)]);
    assert_eq!(
        out,
        vec![GestureEvent::Tap {
            position: Point::new(100.0, 100.0)
        }]
    );
}

#[test]
fn test_distant_second_down_reports_first_tap() {
    let mut g = detector();
    g.process(&[down(1, 100.0, 100.0, 0)]);
    g.process(&[up(1, 100.0, 100.0, 50)]);
    let out = g.process(&[down(2, 300.0, 300.0, 120)]);
    assert_eq!(
        out,
        vec![GestureEvent::Tap {
            position: Point::new(100.0, 100.0)
        }]
    );
    // The second press starts a fresh tap.
    g.process(&[up(2, 300.0, 300.0, 160)]);
    assert_eq!(
        g.poll(500),
        Some(GestureEvent::Tap {
            position: Point::new(300.0, 300.0)
        })
    );
}

#[test]
fn test_second_down_too_soon_is_not_a_double_tap() {
    let mut g = detector();
    g.process(&[down(1, 100.0, 100.0, 0)]);
    g.process(&[up(1, 100.0, 100.0, 50)]);
    let out = g.process(&[down(2, 100.0, 100.0, 60)]);
    assert!(out.contains(&GestureEvent::Tap {
        position: Point::new(100.0, 100.0)
    }));
    let out = g.process(&[up(2, 100.0, 100.0, 90)]);
    assert!(!out.iter().any(|e| matches!(e, GestureEvent::DoubleTap { .. })));
}

#[test]
fn test_pan_beyond_touch_slop() {
    let mut g = detector();
    g.process(&[down(1, 100.0, 100.0, 0)]);
    assert!(transforms(&g.process(&[moved(1, 105.0, 100.0, 10)])).is_empty());
    assert!(!g.is_past_touch_slop());

    let out = transforms(&g.process(&[moved(1, 112.0, 100.0, 20)]));
    assert!(g.is_past_touch_slop());
    assert_eq!(out.len(), 1);
    let (centroid, pan, zoom, rotation) = out[0];
    assert_eq!(centroid, Point::new(105.0, 100.0));
    assert_eq!(pan, Vec2::new(7.0, 0.0));
    assert_eq!(zoom, 1.0);
    assert_eq!(rotation, 0.0);

    let out = transforms(&g.process(&[moved(1, 120.0, 90.0, 30)]));
    assert_eq!(out[0].1, Vec2::new(8.0, -10.0));

    g.process(&[up(1, 120.0, 90.0, 40)]);
    // Moving past the slop cancels the pending tap.
    assert_eq!(g.poll(1000), None);
}

#[test]
fn test_release_velocity() {
    let mut g = detector();
    g.process(&[down(1, 0.0, 50.0, 0)]);
    for i in 1..5u64 {
        g.process(&[moved(1, i as f64 * 10.0, 50.0, i * 10)]);
    }
    let out = g.process(&[up(1, 50.0, 50.0, 50)]);
    let Some(GestureEvent::End { velocity }) = out.last().copied() else {
        panic!("expected an end event, got {out:?}");
    };
    assert_abs_diff_eq!(velocity.x, 1000.0, epsilon = 1e-6);
    assert_abs_diff_eq!(velocity.y, 0.0, epsilon = 1e-9);
}

#[test]
fn test_release_velocity_is_clamped() {
    let mut g = GestureDetector::new(GestureConfig {
        max_fling_velocity: 500.0,
        ..Default::default()
    });
    g.process(&[down(1, 0.0, 0.0, 0)]);
    g.process(&[moved(1, 0.0, 100.0, 10)]);
    let out = g.process(&[up(1, 0.0, 200.0, 20)]);
    assert_eq!(out.last(), Some(&GestureEvent::End { velocity: Vec2::new(0.0, 500.0) }));
}

#[test]
fn test_pinch_zoom_is_clamped_per_batch() {
    let mut g = detector();
    g.process(&[down(1, 100.0, 100.0, 0), down(2, 200.0, 100.0, 0)]);

    // 50 -> 60: clamped to the per-batch limit, still under the slop.
    let out = g.process(&[moved(1, 90.0, 100.0, 10), moved(2, 210.0, 100.0, 10)]);
    assert!(transforms(&out).is_empty());

    let out = transforms(&g.process(&[moved(1, 80.0, 100.0, 20), moved(2, 220.0, 100.0, 20)]));
    assert_eq!(out.len(), 1);
    let (centroid, pan, zoom, _) = out[0];
    assert_eq!(centroid, Point::new(150.0, 100.0));
    assert_eq!(pan, Vec2::ZERO);
    assert_abs_diff_eq!(zoom, 1.08, epsilon = 1e-12);

    let out = transforms(&g.process(&[moved(1, 79.0, 100.0, 30), moved(2, 221.0, 100.0, 30)]));
    assert_abs_diff_eq!(out[0].2, 71.0 / 70.0, epsilon = 1e-12);

    let out = g.process(&[up(1, 79.0, 100.0, 40), up(2, 221.0, 100.0, 40)]);
    assert!(matches!(out.last(), Some(GestureEvent::End { .. })));
    // Two pointers never form a tap.
    assert_eq!(g.poll(1000), None);
}

#[test]
fn test_two_finger_rotation() {
    let mut g = detector();
    g.process(&[down(1, -50.0, 0.0, 0), down(2, 50.0, 0.0, 0)]);
    // Pan both fingers past the slop first.
    let out = transforms(&g.process(&[moved(1, -30.0, 0.0, 10), moved(2, 70.0, 0.0, 10)]));
    assert_eq!(out[0].1, Vec2::new(20.0, 0.0));

    let out = transforms(&g.process(&[moved(1, 20.0, -50.0, 20), moved(2, 20.0, 50.0, 20)]));
    assert_eq!(out.len(), 1);
    let (_, pan, zoom, rotation) = out[0];
    assert_abs_diff_eq!(pan.hypot(), 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(zoom, 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(rotation, 90.0, epsilon = 1e-9);
}

#[test]
fn test_lifting_tracked_pointer_keeps_gesture_alive() {
    let mut g = detector();
    g.process(&[down(1, 0.0, 0.0, 0), down(2, 100.0, 0.0, 0)]);
    let out = g.process(&[up(1, 0.0, 0.0, 10)]);
    assert!(out.is_empty());
    assert!(g.is_active());

    let out = transforms(&g.process(&[moved(2, 130.0, 0.0, 20)]));
    assert_eq!(out[0].1, Vec2::new(30.0, 0.0));
    let out = g.process(&[up(2, 130.0, 0.0, 30)]);
    assert!(matches!(out.last(), Some(GestureEvent::End { .. })));
    assert!(!g.is_active());
}

#[test]
fn test_cancel_ends_without_velocity_or_tap() {
    let mut g = detector();
    g.process(&[down(1, 0.0, 0.0, 0)]);
    g.process(&[moved(1, 40.0, 0.0, 10)]);
    let out = g.process(&[PointerEvent::new(1, PointerPhase::Cancel, Point::new(80.0, 0.0), 20)]);
    assert_eq!(out.last(), Some(&GestureEvent::End { velocity: Vec2::ZERO }));
    assert_eq!(g.poll(1000), None);
}

#[test]
fn test_empty_batch_is_ignored() {
    let mut g = detector();
    assert!(g.process(&[]).is_empty());
    assert!(!g.is_active());
}
