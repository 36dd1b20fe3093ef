//! Draw-phase glue: map published tiles through the layer matrix onto a canvas.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use kurbo::{Affine, Point, Rect};

use crate::decoder::Bitmap;
use crate::geometry::{rect_is_empty, IntSize};
use crate::state::RenderSnapshot;
use crate::tiles::Tile;
use crate::zoom::ZoomState;

/// Drawing surface in layout coordinates.
pub trait Canvas {
    /// Draw `bitmap`, which covers `src_size` source pixels, stretched into `dst`.
    fn draw_bitmap(&mut self, bitmap: &Bitmap, src_size: IntSize, dst: Rect);
}

/// Paint the preview stretched over the content, then every decoded display
/// tile on top. Returns the number of bitmaps drawn.
pub fn paint<C: Canvas + ?Sized>(snapshot: &RenderSnapshot, zoom: &ZoomState, canvas: &mut C) -> usize {
    let content = zoom.content_bounds();
    if rect_is_empty(content) {
        return 0;
    }
    let layer = zoom.matrix() * Affine::translate(content.origin().to_vec2());

    let mut drawn = 0;
    if let Some(preview) = &snapshot.preview_tile {
        drawn += usize::from(draw_tile(preview, layer, canvas));
    }
    for tile in snapshot.display_tiles.iter() {
        drawn += usize::from(draw_tile(tile, layer, canvas));
    }
    drawn
}

fn draw_tile<T: Tile, C: Canvas + ?Sized>(tile: &T, layer: Affine, canvas: &mut C) -> bool {
    let Some(bitmap) = tile.bitmap() else {
        return false;
    };
    let size = tile.dst_size();
    if size.is_zero() {
        return false;
    }
    let local = Rect::from_origin_size(tile.dst_offset().to_point(), size.to_size());
    canvas.draw_bitmap(&bitmap, tile.src_size(), layer.transform_rect_bbox(local));
    true
}

/// Software canvas compositing into an RGBA buffer.
pub struct RasterCanvas {
    target: RgbaImage,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32, background: Rgba<u8>) -> Self {
        Self {
            target: RgbaImage::from_pixel(width, height, background),
        }
    }

    pub fn image(&self) -> &RgbaImage {
        &self.target
    }

    pub fn into_image(self) -> RgbaImage {
        self.target
    }
}

impl Canvas for RasterCanvas {
    fn draw_bitmap(&mut self, bitmap: &Bitmap, _src_size: IntSize, dst: Rect) {
        let bounds = Rect::new(0.0, 0.0, self.target.width() as f64, self.target.height() as f64);
        let visible = dst.intersect(bounds);
        if rect_is_empty(dst) || rect_is_empty(visible) || bitmap.size().is_zero() {
            return;
        }

        // Crop the bitmap to the part landing on the canvas before resampling.
        let (bw, bh) = (bitmap.width() as f64, bitmap.height() as f64);
        let to_bitmap = |p: Point| {
            Point::new(
                (p.x - dst.x0) / dst.width() * bw,
                (p.y - dst.y0) / dst.height() * bh,
            )
        };
        let src0 = to_bitmap(visible.origin());
        let src1 = to_bitmap(Point::new(visible.x1, visible.y1));
        let sx = src0.x.floor().clamp(0.0, bw - 1.0) as u32;
        let sy = src0.y.floor().clamp(0.0, bh - 1.0) as u32;
        let sw = (src1.x.ceil() as u32).clamp(sx + 1, bitmap.width()) - sx;
        let sh = (src1.y.ceil() as u32).clamp(sy + 1, bitmap.height()) - sy;

        let out_x = visible.x0.floor();
        let out_y = visible.y0.floor();
        let out_w = (visible.x1.ceil() - out_x).max(1.0) as u32;
        let out_h = (visible.y1.ceil() - out_y).max(1.0) as u32;

        let cropped = bitmap.image().crop_imm(sx, sy, sw, sh).to_rgba8();
        let scaled = imageops::resize(&cropped, out_w, out_h, FilterType::Triangle);
        imageops::overlay(&mut self.target, &scaled, out_x as i64, out_y as i64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::DynamicImage;

    #[test]
    fn test_raster_canvas_fills_destination() {
        let mut canvas = RasterCanvas::new(10, 10, Rgba([0, 0, 0, 255]));
        let red = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        let bitmap = Bitmap::new(DynamicImage::ImageRgba8(red));
        canvas.draw_bitmap(&bitmap, IntSize::new(4, 4), Rect::new(2.0, 2.0, 6.0, 6.0));
        let image = canvas.image();
        assert_eq!(image.get_pixel(3, 3), &Rgba([255, 0, 0, 255]));
        assert_eq!(image.get_pixel(8, 8), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_raster_canvas_clips_offscreen() {
        let mut canvas = RasterCanvas::new(4, 4, Rgba([0, 0, 0, 255]));
        let blue = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255]));
        let bitmap = Bitmap::new(DynamicImage::ImageRgba8(blue));
        canvas.draw_bitmap(&bitmap, IntSize::new(8, 8), Rect::new(-100.0, -100.0, 100.0, 100.0));
        assert_eq!(canvas.image().get_pixel(0, 0), &Rgba([0, 0, 255, 255]));
        canvas.draw_bitmap(&bitmap, IntSize::new(8, 8), Rect::new(10.0, 10.0, 20.0, 20.0));
        assert_eq!(canvas.image().get_pixel(3, 3), &Rgba([0, 0, 255, 255]));
    }
}
