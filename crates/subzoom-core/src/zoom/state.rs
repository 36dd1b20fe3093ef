use std::time::Duration;

use kurbo::{Affine, Point, Rect, Size, Vec2};
use tracing::debug;

use super::animation::{DecayAnimation, Spring, SpringAnimation, SpringAnimation2D};
use super::source::GestureSource;
use crate::config::{validate_scale_limits, AnimationConfig, ZoomConfig};
use crate::consts::{
    CENTER_SPRING_VISIBILITY_THRESHOLD, DEFAULT_SCALE_TOLERANCE, FLING_MIN_CONSUMED,
    FLING_STOP_VELOCITY, FLING_UNCONSUMED_TOLERANCE, PAN_REFUSED_TOLERANCE,
};
use crate::error::{Result, SubsamplingError};
use crate::geometry::{rect_is_empty, scaled_rect};
use crate::gesture::GestureEvent;
use crate::transform::{Transform, TransformOrigin};

enum ZoomAnimation {
    /// Absolute scale driven toward the double-tap scale around a fixed centroid.
    ToScale {
        spring: SpringAnimation,
        centroid: Point,
    },
    /// Progress from 1 to 0, interpolating `from` back to the identity transform.
    ToDefault {
        spring: SpringAnimation,
        from: Transform,
    },
}

enum ZoomStep {
    Scale { value: f64, centroid: Point, done: bool },
    Default { transform: Transform, done: bool },
}

struct CenterAnimation {
    delay_remaining: f64,
    base: Transform,
    spring: Option<SpringAnimation2D>,
}

/// Pan/zoom state of a viewport showing letterboxed content.
///
/// All coordinates are layout-local: the layout occupies `(0, 0)..layout_size`.
/// Animations are advanced by the host through [`ZoomState::tick`].
pub struct ZoomState {
    min_zoom_scale: f64,
    max_zoom_scale: f64,
    double_tap_zoom_scale: f64,
    layout_size: Size,
    content_aspect_ratio: f64,
    transform: Transform,
    is_gesture_zooming: bool,
    zoom_animation: Option<ZoomAnimation>,
    center_animation: Option<CenterAnimation>,
    fling: Option<DecayAnimation>,
    animation: AnimationConfig,
}

impl Default for ZoomState {
    fn default() -> Self {
        let zoom = ZoomConfig::default();
        Self::build(&zoom, AnimationConfig::default())
    }
}

impl ZoomState {
    /// Create a zoom state, failing fast on invalid scale limits.
    pub fn new(config: &ZoomConfig) -> Result<Self> {
        Self::with_animation(config, AnimationConfig::default())
    }

    pub fn with_animation(config: &ZoomConfig, animation: AnimationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, animation))
    }

    fn build(config: &ZoomConfig, animation: AnimationConfig) -> Self {
        Self {
            min_zoom_scale: config.min_zoom_scale,
            max_zoom_scale: config.max_zoom_scale,
            double_tap_zoom_scale: config.double_tap_zoom_scale,
            layout_size: Size::ZERO,
            content_aspect_ratio: 0.0,
            transform: Transform::IDENTITY,
            is_gesture_zooming: false,
            zoom_animation: None,
            center_animation: None,
            fling: None,
            animation,
        }
    }

    pub fn min_zoom_scale(&self) -> f64 {
        self.min_zoom_scale
    }

    pub fn max_zoom_scale(&self) -> f64 {
        self.max_zoom_scale
    }

    pub fn double_tap_zoom_scale(&self) -> f64 {
        self.double_tap_zoom_scale
    }

    /// Widen the scale limits. Limits may only grow: a larger minimum or a
    /// smaller maximum than the current one is rejected.
    pub fn set_scale_limits(&mut self, min: f64, max: f64, double_tap: f64) -> Result<()> {
        if min > self.min_zoom_scale {
            return Err(SubsamplingError::InvalidScaleLimits(format!(
                "new min_zoom_scale ({min}) must be <= the current min_zoom_scale ({})",
                self.min_zoom_scale
            )));
        }
        if max < self.max_zoom_scale {
            return Err(SubsamplingError::InvalidScaleLimits(format!(
                "new max_zoom_scale ({max}) must be >= the current max_zoom_scale ({})",
                self.max_zoom_scale
            )));
        }
        validate_scale_limits(min, max, double_tap)?;
        self.min_zoom_scale = min;
        self.max_zoom_scale = max;
        self.double_tap_zoom_scale = double_tap;
        Ok(())
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn scale(&self) -> f64 {
        self.transform.scale()
    }

    pub fn layout_size(&self) -> Size {
        self.layout_size
    }

    pub fn layout_bounds(&self) -> Rect {
        Rect::from_origin_size(Point::ORIGIN, self.layout_size)
    }

    pub fn set_layout_size(&mut self, size: Size) {
        let size = Size::new(size.width.max(0.0), size.height.max(0.0));
        if size != self.layout_size {
            debug!(width = size.width, height = size.height, "layout size changed");
            self.layout_size = size;
        }
    }

    pub fn content_aspect_ratio(&self) -> f64 {
        self.content_aspect_ratio
    }

    /// Width over height of the content. Non-positive or non-finite values mean unknown.
    pub fn set_content_aspect_ratio(&mut self, ratio: f64) {
        let ratio = if ratio.is_finite() && ratio > 0.0 {
            ratio
        } else {
            0.0
        };
        if ratio != self.content_aspect_ratio {
            debug!(ratio, "content aspect ratio changed");
            self.content_aspect_ratio = ratio;
        }
    }

    /// Letterboxed, centered rectangle of the content inside the layout.
    /// Falls back to the layout bounds while the aspect ratio is unknown.
    pub fn content_bounds(&self) -> Rect {
        let layout = self.layout_bounds();
        let ratio = self.content_aspect_ratio;
        if ratio <= 0.0 || rect_is_empty(layout) {
            return layout;
        }
        let layout_ratio = layout.width() / layout.height();
        let size = if layout_ratio < ratio {
            Size::new(layout.width(), layout.width() / ratio)
        } else if layout_ratio > ratio {
            Size::new(layout.height() * ratio, layout.height())
        } else {
            layout.size()
        };
        let offset_x = ((layout.width().round() - size.width.round()) / 2.0).round();
        let offset_y = ((layout.height().round() - size.height.round()) / 2.0).round();
        Rect::from_origin_size(Point::new(offset_x, offset_y), size)
    }

    /// Matrix of the current layer transform.
    pub fn matrix(&self) -> Affine {
        self.transform.matrix(self.layout_size)
    }

    /// Content bounds as they appear on screen under the current transform.
    pub fn transformed_content_bounds(&self) -> Rect {
        let content = self.content_bounds();
        if rect_is_empty(content) {
            return Rect::ZERO;
        }
        self.matrix().transform_rect_bbox(content)
    }

    pub fn is_gesture_zooming(&self) -> bool {
        self.is_gesture_zooming
    }

    pub fn is_animating(&self) -> bool {
        self.zoom_animation.is_some() || self.center_animation.is_some() || self.fling.is_some()
    }

    pub fn is_flinging(&self) -> bool {
        self.fling.is_some()
    }

    pub fn is_recentering(&self) -> bool {
        self.center_animation.is_some()
    }

    pub fn is_zoom_animating(&self) -> bool {
        self.zoom_animation.is_some()
    }

    /// Offset of the content center caused by the transform.
    fn pan_zoom_translation(&self) -> Vec2 {
        let content = self.content_bounds();
        let center = content.center();
        (self.matrix() * center) - center
    }

    /// Part of [`Self::pan_zoom_translation`] contributed by scaling about the pivot.
    fn zoom_translation(&self) -> Vec2 {
        self.pan_zoom_translation() - self.transform.translation()
    }

    fn is_restriction_relaxed(&self) -> bool {
        self.is_gesture_zooming || self.center_animation.is_some() || self.zoom_animation.is_some()
    }

    /// Translation range currently allowed. While a zoom gesture or an animation
    /// is running the range is widened so the focal point can be honored.
    pub fn pan_restriction(&self) -> Rect {
        self.pan_restriction_with(self.is_restriction_relaxed())
    }

    /// Translation range allowed once everything has settled.
    pub fn resting_pan_restriction(&self) -> Rect {
        self.pan_restriction_with(false)
    }

    fn pan_restriction_with(&self, relaxed: bool) -> Rect {
        let layout = self.layout_bounds();
        if rect_is_empty(layout) {
            return Rect::ZERO;
        }
        let scale = self.transform.scale();
        let content = self.content_bounds();
        let diff = if relaxed {
            Size::new(
                layout.width() * (2.0 * scale).abs(),
                layout.height() * (2.0 * scale).abs(),
            )
        } else {
            Size::new(
                (content.width() * scale - layout.width()).max(0.0),
                (content.height() * scale - layout.height()).max(0.0),
            )
        };
        let zoom_translation = self.zoom_translation();
        Rect::new(
            -diff.width / 2.0 - zoom_translation.x,
            -diff.height / 2.0 - zoom_translation.y,
            diff.width / 2.0 - zoom_translation.x,
            diff.height / 2.0 - zoom_translation.y,
        )
    }

    /// Portion of a multiplicative zoom change the state will accept.
    pub fn pre_zoom(&self, zoom_change: f64) -> f64 {
        if zoom_change == 1.0 {
            return 1.0;
        }
        let scale = self.transform.scale();
        if scale > self.min_zoom_scale && zoom_change < 1.0 {
            zoom_change.max(self.min_zoom_scale / scale)
        } else if scale < self.max_zoom_scale && zoom_change > 1.0 {
            zoom_change.min(self.max_zoom_scale / scale)
        } else {
            1.0
        }
    }

    /// Portion of a pan delta the state will accept. Pan is refused at or below
    /// scale 1, and on any axis where the scaled content does not fill the layout.
    pub fn pre_pan(&self, pan: Vec2) -> Vec2 {
        if pan == Vec2::ZERO {
            return Vec2::ZERO;
        }
        let scale = self.transform.scale();
        if scale <= 1.0 {
            return Vec2::ZERO;
        }
        let restriction = self.pan_restriction();
        let layout = self.layout_bounds();
        let content = self.content_bounds();
        let t = self.transform.translation();
        let x = if content.width() * scale < layout.width() {
            0.0
        } else {
            pan.x
                .max(restriction.x0 - t.x)
                .min(restriction.x1 - t.x)
        };
        let y = if content.height() * scale < layout.height() {
            0.0
        } else {
            pan.y
                .max(restriction.y0 - t.y)
                .min(restriction.y1 - t.y)
        };
        Vec2::new(x, y)
    }

    /// Priority guard run before every transform mutation. A source that
    /// preempts a running interaction cancels it; one that does not is refused.
    fn check_source(&mut self, source: GestureSource) -> bool {
        let running = [
            (GestureSource::DoubleTap, self.zoom_animation.is_some()),
            (GestureSource::AnimateCenter, self.center_animation.is_some()),
            (GestureSource::Fling, self.fling.is_some()),
        ];
        let others = running
            .into_iter()
            .filter(|&(owner, active)| active && owner != source);
        let mut cancel = Vec::with_capacity(running.len());
        for (owner, _) in others {
            if !source.preempts(owner) {
                return false;
            }
            cancel.push(owner);
        }
        for owner in cancel {
            self.cancel_interaction(owner);
        }
        true
    }

    fn cancel_interaction(&mut self, source: GestureSource) {
        match source {
            GestureSource::Gesture => {}
            GestureSource::DoubleTap => self.zoom_animation = None,
            GestureSource::AnimateCenter => self.center_animation = None,
            GestureSource::Fling => self.fling = None,
        }
    }

    fn update_transformation(&mut self, transform: Transform, source: GestureSource) -> bool {
        if !self.check_source(source) {
            return false;
        }
        self.set_transform(transform)
    }

    fn set_transform(&mut self, transform: Transform) -> bool {
        if self.transform == transform {
            return false;
        }
        self.transform = transform;
        true
    }

    /// Apply a zoom change and pan anchored at `centroid`.
    ///
    /// For [`GestureSource::DoubleTap`] `zoom` is the absolute target scale,
    /// otherwise it multiplies the current scale. The content point under
    /// `centroid` stays under it unless the pan restriction clamps the result.
    /// Returns whether the transform changed.
    pub fn on_gesture(
        &mut self,
        centroid: Point,
        pan: Vec2,
        zoom: f64,
        source: GestureSource,
    ) -> bool {
        if !self.check_source(source) {
            return false;
        }
        let zoom = if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 };

        let old = self.transform;
        let old_scale = old.scale();
        let requested = if source == GestureSource::DoubleTap {
            zoom
        } else {
            old_scale * zoom
        };
        let new_scale = requested.max(self.min_zoom_scale).min(self.max_zoom_scale);

        if old_scale != new_scale && source == GestureSource::Gesture {
            self.is_gesture_zooming = true;
        }
        let restriction = self.pan_restriction();

        let translation = if old_scale != new_scale {
            let centroid = Point::new(
                centroid.x.max(0.0).min(self.layout_size.width),
                centroid.y.max(0.0).min(self.layout_size.height),
            );
            let pivot = old.transform_origin.pivot(self.layout_size);
            let offset = centroid - pivot;
            offset - (offset - old.translation()) * (new_scale / old_scale) + pan
        } else {
            old.translation() + pan
        };
        let clamped = Vec2::new(
            translation.x.max(restriction.x0).min(restriction.x1),
            translation.y.max(restriction.y0).min(restriction.y1),
        );

        self.set_transform(old.with_scale(new_scale).with_translation(clamped))
    }

    /// End of a direct gesture. Starts the delayed recenter after a zoom
    /// gesture, otherwise flings along the axes where content overflows both edges.
    pub fn on_gesture_end(&mut self, velocity: Vec2) {
        let layout = self.layout_bounds();
        let bounds = self.transformed_content_bounds();
        let fling_horizontal = bounds.x0 < layout.x0 && bounds.x1 > layout.x1;
        let fling_vertical = bounds.y0 < layout.y0 && bounds.y1 > layout.y1;

        let was_zooming = std::mem::replace(&mut self.is_gesture_zooming, false);
        if was_zooming {
            if self.zoom_animation.is_none() {
                self.start_center_animation();
            }
            return;
        }

        let velocity = Vec2::new(
            if fling_horizontal { velocity.x } else { 0.0 },
            if fling_vertical { velocity.y } else { 0.0 },
        );
        self.start_fling(velocity);
    }

    fn start_fling(&mut self, velocity: Vec2) {
        if velocity.x.abs() <= FLING_STOP_VELOCITY && velocity.y.abs() <= FLING_STOP_VELOCITY {
            return;
        }
        if self.zoom_animation.is_some() {
            debug!("fling rejected while zoom animating");
            return;
        }
        if self.center_animation.is_some() {
            debug!("fling rejected while recentering");
            return;
        }
        debug!(vx = velocity.x, vy = velocity.y, "fling started");
        self.fling = Some(DecayAnimation::new(
            velocity,
            self.animation.fling_friction,
            FLING_STOP_VELOCITY,
        ));
    }

    fn start_center_animation(&mut self) {
        self.center_animation = Some(CenterAnimation {
            delay_remaining: self.animation.center_delay_ms as f64 / 1000.0,
            base: self.transform,
            spring: None,
        });
    }

    /// Translation that brings the content to its nearest resting position,
    /// or `None` when it is already there.
    fn center_target(&self) -> Option<Vec2> {
        let layout = self.layout_bounds();
        let bounds = self.transformed_content_bounds();
        let pan_zoom = self.pan_zoom_translation();

        let target_x = resting_offset(
            bounds.x0 - layout.x0,
            bounds.x1 - layout.x1,
            bounds.width(),
            layout.width(),
            pan_zoom.x,
        );
        let target_y = resting_offset(
            bounds.y0 - layout.y0,
            bounds.y1 - layout.y1,
            bounds.height(),
            layout.height(),
            pan_zoom.y,
        );
        let target = Vec2::new(target_x, target_y);
        if target == pan_zoom {
            return None;
        }
        let zoom_translation = pan_zoom - self.transform.translation();
        Some(target - zoom_translation)
    }

    /// Zoom toward the double-tap scale at `point`, or back to the identity
    /// transform when already zoomed.
    pub fn on_double_tap(&mut self, point: Point) {
        self.zoom_animation = None;
        self.center_animation = None;
        self.fling = None;

        let spring = Spring::new(
            self.animation.zoom_stiffness,
            self.animation.zoom_damping_ratio,
        );
        let threshold = self.animation.zoom_visibility_threshold;
        let scale = self.transform.scale();

        if (scale - 1.0).abs() < DEFAULT_SCALE_TOLERANCE {
            let target = self.double_tap_zoom_scale;
            let centroid = self.double_tap_centroid(point, target);
            debug!(target, x = centroid.x, y = centroid.y, "double tap zoom in");
            self.zoom_animation = Some(ZoomAnimation::ToScale {
                spring: SpringAnimation::new(spring, scale, target, threshold),
                centroid,
            });
        } else {
            debug!(scale, "double tap zoom out");
            self.zoom_animation = Some(ZoomAnimation::ToDefault {
                spring: SpringAnimation::new(spring, 1.0, 0.0, threshold),
                from: self.transform,
            });
        }
    }

    /// Anchor for a double-tap zoom that keeps the zoomed content flush with
    /// the layout edges instead of exposing empty space.
    fn double_tap_centroid(&self, point: Point, target: f64) -> Point {
        let layout = self.layout_bounds();
        let content = self.content_bounds();
        let scaled = scaled_rect(content, target, point);
        let center = layout.center();

        let x = if scaled.width() <= layout.width() {
            center.x
        } else if same_sign(scaled.x0 - layout.x0, scaled.x1 - layout.x1) {
            if point.x < center.x {
                (layout.x0 - content.x0 * target) / (1.0 - target)
            } else {
                (layout.x1 - content.x1 * target) / (1.0 - target)
            }
        } else {
            point.x
        };
        let y = if scaled.height() <= layout.height() {
            center.y
        } else if same_sign(scaled.y0 - layout.y0, scaled.y1 - layout.y1) {
            if point.y < center.y {
                (layout.y0 - content.y0 * target) / (1.0 - target)
            } else {
                (layout.y1 - content.y1 * target) / (1.0 - target)
            }
        } else {
            point.y
        };
        Point::new(x, y)
    }

    /// Route recognizer output into the state. Returns whether the event was consumed;
    /// an unconsumed transform can be handed to an enclosing scroller.
    pub fn apply_gesture(&mut self, event: &GestureEvent) -> bool {
        match *event {
            GestureEvent::Transform {
                centroid,
                pan,
                zoom,
                ..
            } => {
                let zoom = self.pre_zoom(zoom);
                let consumed = self.pre_pan(pan);
                let refused = zoom == 1.0
                    && ((consumed.x.abs() < PAN_REFUSED_TOLERANCE && pan.x.abs() > pan.y.abs())
                        || (consumed.y.abs() < PAN_REFUSED_TOLERANCE && pan.y.abs() > pan.x.abs()));
                if refused {
                    return false;
                }
                if zoom != 1.0 || consumed != Vec2::ZERO {
                    self.on_gesture(centroid, consumed, zoom, GestureSource::Gesture);
                }
                true
            }
            GestureEvent::End { velocity } => {
                self.on_gesture_end(velocity);
                true
            }
            GestureEvent::DoubleTap { position } => {
                self.on_double_tap(position);
                true
            }
            GestureEvent::Tap { .. } => false,
        }
    }

    /// Advance running animations by `dt`. Returns whether any are still running.
    pub fn tick(&mut self, dt: Duration) -> bool {
        let dt = dt.as_secs_f64();
        self.tick_zoom_animation(dt);
        self.tick_center_animation(dt);
        self.tick_fling(dt);
        self.is_animating()
    }

    fn tick_zoom_animation(&mut self, dt: f64) {
        let step = match self.zoom_animation.as_mut() {
            None => return,
            Some(ZoomAnimation::ToScale { spring, centroid }) => {
                let done = spring.advance(dt);
                ZoomStep::Scale {
                    value: spring.value(),
                    centroid: *centroid,
                    done,
                }
            }
            Some(ZoomAnimation::ToDefault { spring, from }) => {
                let done = spring.advance(dt);
                ZoomStep::Default {
                    transform: interpolate_to_default(from, spring.value()),
                    done,
                }
            }
        };

        match step {
            ZoomStep::Scale {
                value,
                centroid,
                done,
            } => {
                self.on_gesture(centroid, Vec2::ZERO, value, GestureSource::DoubleTap);
                if done {
                    self.zoom_animation = None;
                }
            }
            ZoomStep::Default { transform, done } => {
                self.update_transformation(transform, GestureSource::DoubleTap);
                if done {
                    // Land exactly on identity regardless of accumulated rounding.
                    self.update_transformation(Transform::IDENTITY, GestureSource::DoubleTap);
                    self.zoom_animation = None;
                }
            }
        }
    }

    fn tick_center_animation(&mut self, dt: f64) {
        let pending = match self.center_animation.as_mut() {
            None => return,
            Some(center) if center.spring.is_none() => {
                center.delay_remaining -= dt;
                Some(center.delay_remaining)
            }
            Some(_) => None,
        };

        if let Some(remaining) = pending {
            if remaining > 0.0 {
                return;
            }
            match self.center_target() {
                None => {
                    self.center_animation = None;
                }
                Some(target) => {
                    let base = self.transform;
                    debug!(x = target.x, y = target.y, "recenter started");
                    let spring = Spring::new(
                        self.animation.center_stiffness,
                        self.animation.center_damping_ratio,
                    );
                    self.center_animation = Some(CenterAnimation {
                        delay_remaining: 0.0,
                        base,
                        spring: Some(SpringAnimation2D::new(
                            spring,
                            base.translation(),
                            target,
                            CENTER_SPRING_VISIBILITY_THRESHOLD,
                        )),
                    });
                }
            }
            return;
        }

        let (base, translation, done) = match self.center_animation.as_mut() {
            Some(CenterAnimation {
                base,
                spring: Some(spring),
                ..
            }) => {
                let done = spring.advance(dt);
                (*base, spring.value(), done)
            }
            _ => return,
        };
        self.update_transformation(
            base.with_translation(translation),
            GestureSource::AnimateCenter,
        );
        if done {
            self.center_animation = None;
        }
    }

    fn tick_fling(&mut self, dt: f64) {
        let (delta, settled) = match self.fling.as_mut() {
            None => return,
            Some(fling) => {
                let delta = fling.advance(dt);
                (delta, fling.is_settled())
            }
        };
        if self.zoom_animation.is_some() || self.center_animation.is_some() {
            self.fling = None;
            return;
        }

        let available = self.pre_pan(delta);
        let consumed =
            if available.x.abs() > FLING_MIN_CONSUMED || available.y.abs() > FLING_MIN_CONSUMED {
                self.on_gesture(Point::ORIGIN, available, 1.0, GestureSource::Fling);
                available
            } else {
                Vec2::ZERO
            };

        let blocked = (delta.x - consumed.x).abs() > FLING_UNCONSUMED_TOLERANCE
            && (delta.y - consumed.y).abs() > FLING_UNCONSUMED_TOLERANCE;
        if blocked || settled {
            self.fling = None;
        }
    }
}

fn same_sign(a: f64, b: f64) -> bool {
    (a < 0.0 && b < 0.0) || (a > 0.0 && b > 0.0)
}

/// Resting offset of the content center on one axis, given how far each content
/// edge sits from the matching layout edge.
fn resting_offset(
    start_diff: f64,
    end_diff: f64,
    content_extent: f64,
    layout_extent: f64,
    current: f64,
) -> f64 {
    if same_sign(start_diff, end_diff) {
        if content_extent >= layout_extent {
            if end_diff.abs() < start_diff.abs() {
                (layout_extent - content_extent) / 2.0
            } else {
                -(layout_extent - content_extent) / 2.0
            }
        } else {
            0.0
        }
    } else if start_diff > 0.0 && end_diff < 0.0 {
        0.0
    } else {
        current
    }
}

fn interpolate_to_default(from: &Transform, progress: f64) -> Transform {
    let origin = TransformOrigin {
        pivot_fraction_x: 0.5 + (from.transform_origin.pivot_fraction_x - 0.5) * progress,
        pivot_fraction_y: 0.5 + (from.transform_origin.pivot_fraction_y - 0.5) * progress,
    };
    Transform {
        scale_x: 1.0 + (from.scale_x - 1.0) * progress,
        scale_y: 1.0 + (from.scale_y - 1.0) * progress,
        translation_x: from.translation_x * progress,
        translation_y: from.translation_y * progress,
        rotation_z: from.rotation_z,
        transform_origin: origin,
    }
}
