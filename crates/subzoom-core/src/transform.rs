use std::fmt;

use kurbo::{Affine, Point, Size, Vec2};

/// Pivot of scale and rotation, as fractions of the layout size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransformOrigin {
    pub pivot_fraction_x: f64,
    pub pivot_fraction_y: f64,
}

impl TransformOrigin {
    pub const CENTER: TransformOrigin = TransformOrigin {
        pivot_fraction_x: 0.5,
        pivot_fraction_y: 0.5,
    };

    pub fn pivot(&self, layout_size: Size) -> Point {
        Point::new(
            self.pivot_fraction_x * layout_size.width,
            self.pivot_fraction_y * layout_size.height,
        )
    }
}

impl Default for TransformOrigin {
    fn default() -> Self {
        Self::CENTER
    }
}

/// Layer transform applied to the content: scale and rotate about `transform_origin`,
/// then translate.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub translation_x: f64,
    pub translation_y: f64,
    /// Degrees, clockwise.
    pub rotation_z: f64,
    pub transform_origin: TransformOrigin,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        scale_x: 1.0,
        scale_y: 1.0,
        translation_x: 0.0,
        translation_y: 0.0,
        rotation_z: 0.0,
        transform_origin: TransformOrigin::CENTER,
    };

    /// Uniform scale. The zoom layer never sets `scale_x != scale_y`; when they do
    /// differ the smaller one is reported.
    pub fn scale(&self) -> f64 {
        self.scale_x.min(self.scale_y)
    }

    pub fn translation(&self) -> Vec2 {
        Vec2::new(self.translation_x, self.translation_y)
    }

    pub fn with_scale(self, scale: f64) -> Self {
        Self {
            scale_x: scale,
            scale_y: scale,
            ..self
        }
    }

    pub fn with_translation(self, translation: Vec2) -> Self {
        Self {
            translation_x: translation.x,
            translation_y: translation.y,
            ..self
        }
    }

    /// Matrix mapping layout-local (untransformed) points to on-screen points.
    pub fn matrix(&self, layout_size: Size) -> Affine {
        let pivot = self.transform_origin.pivot(layout_size).to_vec2();
        Affine::translate(self.translation())
            * Affine::translate(pivot)
            * Affine::rotate(self.rotation_z.to_radians())
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
            * Affine::translate(-pivot)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{scale={:.4}x{:.4}, translation=({:.2}, {:.2}), origin=({:.2}, {:.2})}}",
            self.scale_x,
            self.scale_y,
            self.translation_x,
            self.translation_y,
            self.transform_origin.pivot_fraction_x,
            self.transform_origin.pivot_fraction_y
        )
    }
}
