use kurbo::Rect;
use tracing::trace;

use super::pool::TilePool;
use super::tile::{SnapshotTile, TileKey};
use crate::config::TileConfig;
use crate::geometry::{
    rect_is_empty, rect_overlaps, round_rect, round_size, scaled_rect, IntOffset, IntRect,
    IntSize,
};
use crate::zoom::ZoomState;

/// Upper bound on slices per axis, reached only for absurd transformed sizes.
const MAX_SLICES: u32 = 1 << 16;

/// Everything a planning pass reads. Equal inputs plan the same tile list,
/// so callers skip passes whose inputs did not change.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanInputs {
    pub layout_bounds: Rect,
    pub content_bounds: Rect,
    pub transformed_content_bounds: Rect,
    pub scale_x: f64,
    pub scale_y: f64,
    pub source_size: IntSize,
    pub preview_size: Option<IntSize>,
    pub decoder_ready: bool,
}

impl PlanInputs {
    pub fn from_zoom(
        zoom: &ZoomState,
        source_size: IntSize,
        preview_size: Option<IntSize>,
        decoder_ready: bool,
    ) -> Self {
        let transform = zoom.transform();
        Self {
            layout_bounds: zoom.layout_bounds(),
            content_bounds: zoom.content_bounds(),
            transformed_content_bounds: zoom.transformed_content_bounds(),
            scale_x: transform.scale_x,
            scale_y: transform.scale_y,
            source_size,
            preview_size,
            decoder_ready,
        }
    }

    /// Whether the preview alone already has enough resolution on both axes.
    fn preview_suffices(&self, threshold: f64) -> bool {
        let Some(preview) = self.preview_size.filter(|p| !p.is_zero()) else {
            return false;
        };
        let bounds = self.transformed_content_bounds;
        bounds.width() / f64::from(preview.width) < threshold
            && bounds.height() / f64::from(preview.height) < threshold
    }
}

/// Largest power of two not exceeding the source-to-screen ratio on the
/// tighter axis, so decoded tiles never have less detail than the screen.
pub fn sample_size_for(source: IntSize, transformed_width: f64, transformed_height: f64) -> u32 {
    let ratio = (source.width as f64 / transformed_width)
        .min(source.height as f64 / transformed_height);
    let mut sample_size: u32 = 1;
    while ratio >= sample_size as f64 * 2.0 && sample_size < 1 << 30 {
        sample_size *= 2;
    }
    sample_size
}

/// Smallest power-of-two slice count keeping each on-screen slice within `threshold`.
pub fn slice_count(extent: f64, threshold: u32) -> u32 {
    let mut slices: u32 = 1;
    while extent / slices as f64 > threshold as f64 && slices < MAX_SLICES {
        slices *= 2;
    }
    slices
}

/// Power-of-two sample size bringing a full-image decode near `budget` pixels.
pub fn preview_sample_size(source: IntSize, budget: u64) -> u32 {
    let times = (source.area() as f64 / budget as f64).sqrt();
    let mut sample_size: u32 = 1;
    while times >= sample_size as f64 && sample_size < 1 << 30 {
        sample_size *= 2;
    }
    sample_size
}

/// Compute the tiles covering the visible part of the content.
///
/// Tiles come back row-major. Each one is looked up in `pool` by
/// `(source rect, sample size)` so repeated passes share identities.
/// The list is empty while there is nothing to decode from or the preview
/// resolution already covers the screen.
pub fn plan_tiles(inputs: &PlanInputs, pool: &TilePool, config: &TileConfig) -> Vec<SnapshotTile> {
    // Every plan, empty ones included, retires the previous plan's protection.
    let generation = pool.begin_generation();
    let transformed = inputs.transformed_content_bounds;
    let source = inputs.source_size;
    if rect_is_empty(transformed)
        || rect_is_empty(inputs.content_bounds)
        || !inputs.decoder_ready
        || source.is_zero()
        || inputs.preview_suffices(config.display_source_threshold)
    {
        return Vec::new();
    }

    let sample_size = sample_size_for(source, transformed.width(), transformed.height());
    let layout = inputs.layout_bounds;
    let overlap_bounds = scaled_rect(layout, config.tile_overlap_scale, layout.center());

    let horizontal = slice_count(transformed.width(), config.slice_threshold);
    let vertical = slice_count(transformed.height(), config.slice_threshold);

    let content = inputs.content_bounds.size();
    let content_int = round_size(content);
    let tile_width = (content.width / horizontal as f64).round() as i64;
    let tile_height = (content.height / vertical as f64).round() as i64;
    let last_width = content_int.width as i64 - (horizontal as i64 - 1) * tile_width;
    let last_height = content_int.height as i64 - (vertical as i64 - 1) * tile_height;

    let source_scale_x = source.width as f64 / content.width;
    let source_scale_y = source.height as f64 / content.height;
    let source_bounds = IntRect::from_size(source);

    let mut tiles = Vec::new();
    for column in 0..vertical as i64 {
        let height = if column < vertical as i64 - 1 {
            tile_height
        } else {
            last_height
        };
        let offset_y = tile_height * column;
        let scaled_y = (offset_y as f64) * inputs.scale_y + transformed.y0;

        for row in 0..horizontal as i64 {
            let width = if row < horizontal as i64 - 1 {
                tile_width
            } else {
                last_width
            };
            if width <= 0 || height <= 0 {
                continue;
            }
            let offset_x = tile_width * row;
            let scaled_x = (offset_x as f64) * inputs.scale_x + transformed.x0;

            let scaled = Rect::new(
                scaled_x,
                scaled_y,
                scaled_x + width as f64 * inputs.scale_x,
                scaled_y + height as f64 * inputs.scale_y,
            );
            if !rect_overlaps(scaled, overlap_bounds) {
                continue;
            }

            let source_x = offset_x as f64 * source_scale_x;
            let source_y = offset_y as f64 * source_scale_y;
            let source_rect = round_rect(Rect::new(
                source_x,
                source_y,
                source_x + width as f64 * source_scale_x,
                source_y + height as f64 * source_scale_y,
            ))
            .intersect(&source_bounds);
            if source_rect.is_empty() {
                continue;
            }

            let tile = pool.obtain(TileKey::new(source_rect, sample_size));
            tiles.push(SnapshotTile {
                tile,
                dst_offset: IntOffset::new(offset_x as i32, offset_y as i32),
                dst_size: IntSize::new(width as u32, height as u32),
            });
        }
    }

    trace!(
        generation,
        sample_size,
        horizontal,
        vertical,
        tiles = tiles.len(),
        "tiles planned"
    );
    tiles
}
