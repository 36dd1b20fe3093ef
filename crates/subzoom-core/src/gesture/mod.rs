//! Pointer-event recognizer producing tap, double-tap and pan/zoom gestures.

mod velocity;

use std::collections::BTreeMap;
use std::f64::consts::PI;

use kurbo::{Point, Vec2};

use crate::config::GestureConfig;
use crate::consts::{MAX_ZOOM_CHANGE, MIN_ZOOM_CHANGE};

pub use velocity::VelocityTracker;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    pub id: u64,
    pub phase: PointerPhase,
    pub position: Point,
    pub time_ms: u64,
}

impl PointerEvent {
    pub fn new(id: u64, phase: PointerPhase, position: Point, time_ms: u64) -> Self {
        Self {
            id,
            phase,
            position,
            time_ms,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureEvent {
    /// Single tap, reported once the double-tap window has expired.
    Tap { position: Point },
    DoubleTap { position: Point },
    /// Incremental change for one event batch. `centroid` is the pre-batch centroid,
    /// `zoom` is multiplicative and `rotation` is in degrees.
    Transform {
        centroid: Point,
        pan: Vec2,
        zoom: f64,
        rotation: f64,
    },
    /// All pointers lifted. `velocity` is in units per second.
    End { velocity: Vec2 },
}

#[derive(Clone, Copy, Debug)]
enum TapState {
    Idle,
    FirstDown,
    WaitingSecond { up_position: Point, up_time_ms: u64 },
    SecondDown { first_up_position: Point },
    Cancelled,
}

/// Stateful recognizer. Feed it pointer batches with [`GestureDetector::process`]
/// and call [`GestureDetector::poll`] on frames without input so a pending
/// single tap can be reported.
pub struct GestureDetector {
    config: GestureConfig,
    pointers: BTreeMap<u64, Point>,
    tracked_pointer: Option<u64>,
    velocity: VelocityTracker,
    zoom: f64,
    pan: Vec2,
    past_touch_slop: bool,
    tap: TapState,
}

impl GestureDetector {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            pointers: BTreeMap::new(),
            tracked_pointer: None,
            velocity: VelocityTracker::new(),
            zoom: 1.0,
            pan: Vec2::ZERO,
            past_touch_slop: false,
            tap: TapState::Idle,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.pointers.is_empty()
    }

    pub fn is_past_touch_slop(&self) -> bool {
        self.past_touch_slop
    }

    /// Report a pending single tap once the double-tap timeout has elapsed.
    pub fn poll(&mut self, now_ms: u64) -> Option<GestureEvent> {
        if let TapState::WaitingSecond {
            up_position,
            up_time_ms,
        } = self.tap
        {
            if now_ms.saturating_sub(up_time_ms) > self.config.double_tap_timeout_ms {
                self.tap = TapState::Idle;
                return Some(GestureEvent::Tap {
                    position: up_position,
                });
            }
        }
        None
    }

    pub fn process(&mut self, batch: &[PointerEvent]) -> Vec<GestureEvent> {
        let mut out = Vec::new();
        let Some(batch_start) = batch.iter().map(|e| e.time_ms).min() else {
            return out;
        };
        let batch_end = batch.iter().map(|e| e.time_ms).max().unwrap_or(batch_start);
        if let Some(tap) = self.poll(batch_start) {
            out.push(tap);
        }

        let before = self.pointers.clone();
        let mut cancelled = false;
        let mut started = false;
        let mut last_up = None;

        for event in batch {
            match event.phase {
                PointerPhase::Down => {
                    if self.pointers.is_empty() && !started && before.is_empty() {
                        started = true;
                        self.start_gesture(event, &mut out);
                    }
                    self.pointers.insert(event.id, event.position);
                }
                PointerPhase::Move => {
                    if let Some(position) = self.pointers.get_mut(&event.id) {
                        *position = event.position;
                    }
                }
                PointerPhase::Up => {
                    if self.pointers.remove(&event.id).is_some() {
                        last_up = Some(event.position);
                    }
                }
                PointerPhase::Cancel => {
                    self.pointers.remove(&event.id);
                    cancelled = true;
                }
            }
            if Some(event.id) == self.tracked_pointer {
                self.velocity.add(event.time_ms, event.position);
            }
        }

        if self.pointers.len() > 1 || cancelled {
            self.cancel_tap(&mut out);
        }
        if let Some(tracked) = self.tracked_pointer {
            if !self.pointers.contains_key(&tracked) {
                if let Some((&id, &position)) = self.pointers.iter().next() {
                    self.tracked_pointer = Some(id);
                    self.velocity.reset();
                    self.velocity.add(batch_end, position);
                }
            }
        }

        self.track_motion(&before, &mut out);

        let had_pointers = started || !before.is_empty();
        if had_pointers && self.pointers.is_empty() {
            self.end_gesture(cancelled, last_up, batch_end, &mut out);
        }
        out
    }

    fn start_gesture(&mut self, down: &PointerEvent, out: &mut Vec<GestureEvent>) {
        self.zoom = 1.0;
        self.pan = Vec2::ZERO;
        self.past_touch_slop = false;
        self.velocity.reset();
        self.tracked_pointer = Some(down.id);

        self.tap = match self.tap {
            TapState::WaitingSecond {
                up_position,
                up_time_ms,
            } => {
                let elapsed = down.time_ms.saturating_sub(up_time_ms);
                let distance = (down.position - up_position).hypot();
                if elapsed >= self.config.double_tap_min_time_ms
                    && elapsed <= self.config.double_tap_timeout_ms
                    && distance <= self.config.double_tap_slop
                {
                    TapState::SecondDown {
                        first_up_position: up_position,
                    }
                } else {
                    out.push(GestureEvent::Tap {
                        position: up_position,
                    });
                    TapState::FirstDown
                }
            }
            _ => TapState::FirstDown,
        };
    }

    fn cancel_tap(&mut self, out: &mut Vec<GestureEvent>) {
        match self.tap {
            TapState::SecondDown { first_up_position } => {
                out.push(GestureEvent::Tap {
                    position: first_up_position,
                });
                self.tap = TapState::Cancelled;
            }
            TapState::FirstDown => self.tap = TapState::Cancelled,
            _ => {}
        }
    }

    fn track_motion(&mut self, before: &BTreeMap<u64, Point>, out: &mut Vec<GestureEvent>) {
        let pairs: Vec<(Point, Point)> = before
            .iter()
            .filter_map(|(id, &prev)| self.pointers.get(id).map(|&cur| (prev, cur)))
            .collect();
        if pairs.is_empty() {
            return;
        }

        let prev_centroid = centroid(pairs.iter().map(|(p, _)| *p));
        let cur_centroid = centroid(pairs.iter().map(|(_, c)| *c));
        let prev_size = centroid_size(pairs.iter().map(|(p, _)| *p), prev_centroid);
        let cur_size = centroid_size(pairs.iter().map(|(_, c)| *c), cur_centroid);

        let pan_change = cur_centroid - prev_centroid;
        let raw_zoom = if prev_size > 0.0 && cur_size > 0.0 {
            cur_size / prev_size
        } else {
            1.0
        };
        let zoom_change = raw_zoom.clamp(MIN_ZOOM_CHANGE, MAX_ZOOM_CHANGE);
        let rotation = if pairs.len() > 1 {
            let sum: f64 = pairs
                .iter()
                .map(|(p, c)| {
                    let a = (*p - prev_centroid).atan2();
                    let b = (*c - cur_centroid).atan2();
                    normalize_angle(b - a)
                })
                .sum();
            (sum / pairs.len() as f64).to_degrees()
        } else {
            0.0
        };

        if !self.past_touch_slop {
            self.zoom *= zoom_change;
            self.pan += pan_change;
            let zoom_motion = (1.0 - self.zoom).abs() * prev_size;
            let pan_motion = self.pan.hypot();
            if zoom_motion > self.config.touch_slop || pan_motion > self.config.touch_slop {
                self.past_touch_slop = true;
                self.cancel_tap(out);
            }
        }

        if self.past_touch_slop
            && (zoom_change != 1.0 || pan_change != Vec2::ZERO || rotation != 0.0)
        {
            out.push(GestureEvent::Transform {
                centroid: prev_centroid,
                pan: pan_change,
                zoom: zoom_change,
                rotation,
            });
        }
    }

    fn end_gesture(
        &mut self,
        cancelled: bool,
        last_up: Option<Point>,
        time_ms: u64,
        out: &mut Vec<GestureEvent>,
    ) {
        let velocity = if cancelled {
            Vec2::ZERO
        } else {
            self.velocity.velocity(self.config.max_fling_velocity)
        };
        out.push(GestureEvent::End { velocity });
        self.tracked_pointer = None;

        self.tap = match (self.tap, last_up) {
            (TapState::FirstDown, Some(up_position)) if !cancelled => TapState::WaitingSecond {
                up_position,
                up_time_ms: time_ms,
            },
            (TapState::SecondDown { .. }, Some(position)) if !cancelled => {
                out.push(GestureEvent::DoubleTap { position });
                TapState::Idle
            }
            (TapState::SecondDown { first_up_position }, _) => {
                out.push(GestureEvent::Tap {
                    position: first_up_position,
                });
                TapState::Idle
            }
            _ => TapState::Idle,
        };
    }
}

fn centroid(points: impl Iterator<Item = Point>) -> Point {
    let mut sum = Vec2::ZERO;
    let mut count = 0usize;
    for p in points {
        sum += p.to_vec2();
        count += 1;
    }
    if count == 0 {
        Point::ORIGIN
    } else {
        (sum / count as f64).to_point()
    }
}

/// Average distance of `points` from `center`.
fn centroid_size(points: impl Iterator<Item = Point>, center: Point) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for p in points {
        sum += (p - center).hypot();
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn normalize_angle(mut radians: f64) -> f64 {
    while radians > PI {
        radians -= 2.0 * PI;
    }
    while radians < -PI {
        radians += 2.0 * PI;
    }
    radians
}
