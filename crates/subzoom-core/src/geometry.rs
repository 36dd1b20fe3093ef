//! Integer rectangles for source regions and small float helpers on top of `kurbo`.

use std::fmt;

use kurbo::{Point, Rect, Size};
use serde::{Deserialize, Serialize};

/// Integer rectangle in source-pixel or content-pixel space.
///
/// Field order matters: the derived ordering compares `left`, then `top`,
/// `right` and `bottom`, which is the ordering the tile pool is sorted by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl IntRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    pub fn from_size(size: IntSize) -> Self {
        Self::new(0, 0, size.width as i32, size.height as i32)
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Whether `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &IntRect) -> bool {
        other.left >= self.left
            && other.top >= self.top
            && other.right <= self.right
            && other.bottom <= self.bottom
    }

    pub fn intersect(&self, other: &IntRect) -> IntRect {
        IntRect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        )
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(
            self.left as f64,
            self.top as f64,
            self.right as f64,
            self.bottom as f64,
        )
    }
}

impl fmt::Display for IntRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}]",
            self.left, self.top, self.right, self.bottom
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntSize {
    pub width: u32,
    pub height: u32,
}

impl IntSize {
    pub const ZERO: IntSize = IntSize { width: 0, height: 0 };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_zero(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn to_size(&self) -> Size {
        Size::new(self.width as f64, self.height as f64)
    }

    /// Width over height, or 0.0 when either side is zero.
    pub fn aspect_ratio(&self) -> f64 {
        if self.is_zero() {
            0.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

impl fmt::Display for IntSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntOffset {
    pub x: i32,
    pub y: i32,
}

impl IntOffset {
    pub const ZERO: IntOffset = IntOffset { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn to_point(&self) -> Point {
        Point::new(self.x as f64, self.y as f64)
    }
}

/// Round each edge of `rect` to the nearest integer.
pub fn round_rect(rect: Rect) -> IntRect {
    IntRect::new(
        rect.x0.round() as i32,
        rect.y0.round() as i32,
        rect.x1.round() as i32,
        rect.y1.round() as i32,
    )
}

pub fn round_size(size: Size) -> IntSize {
    IntSize::new(
        size.width.round().max(0.0) as u32,
        size.height.round().max(0.0) as u32,
    )
}

/// Scale `rect` by `scale` around `pivot`. Both must be in the same coordinate space.
pub fn scaled_rect(rect: Rect, scale: f64, pivot: Point) -> Rect {
    Rect::new(
        pivot.x - scale * (pivot.x - rect.x0),
        pivot.y - scale * (pivot.y - rect.y0),
        pivot.x + scale * (rect.x1 - pivot.x),
        pivot.y + scale * (rect.y1 - pivot.y),
    )
}

/// True when the open interiors of `a` and `b` intersect.
pub fn rect_overlaps(a: Rect, b: Rect) -> bool {
    a.x1 > b.x0 && b.x1 > a.x0 && a.y1 > b.y0 && b.y1 > a.y0
}

/// True when `rect` has no positive area.
pub fn rect_is_empty(rect: Rect) -> bool {
    !(rect.x1 > rect.x0 && rect.y1 > rect.y0)
}
