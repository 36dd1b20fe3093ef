use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::decoder::{Bitmap, PixelFormat, SharedDecoder};
use crate::error::{Result, SubsamplingError};
use crate::geometry::{IntOffset, IntRect, IntSize};
use crate::sync::lock;

/// Identity of a decoded region: the source rectangle and its downsample factor.
///
/// Ordered by sample size first so pool entries for one zoom level are adjacent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileKey {
    pub sample_size: u32,
    pub rect: IntRect,
}

impl TileKey {
    pub fn new(rect: IntRect, sample_size: u32) -> Self {
        Self { sample_size, rect }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @{}", self.rect, self.sample_size)
    }
}

/// What a call to [`ReusableTile::decode`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// A new bitmap was produced by the decoder.
    Decoded,
    /// A bitmap was already held; the decoder was not touched.
    Cached,
    /// The tile was destroyed; nothing was decoded.
    Destroyed,
}

#[derive(Default)]
struct TileSlot {
    bitmap: Option<Arc<Bitmap>>,
    destroyed: bool,
}

/// A pooled decode slot with a stable identity.
///
/// At most one decode per identity ever reaches the decoder while a bitmap
/// is held. A bitmap produced after `destroy` is dropped instead of stored.
pub struct ReusableTile {
    key: TileKey,
    slot: Mutex<TileSlot>,
    last_used: AtomicU64,
}

impl ReusableTile {
    pub fn new(key: TileKey) -> Self {
        Self {
            key,
            slot: Mutex::new(TileSlot::default()),
            last_used: AtomicU64::new(0),
        }
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn rect(&self) -> IntRect {
        self.key.rect
    }

    pub fn sample_size(&self) -> u32 {
        self.key.sample_size
    }

    pub fn bitmap(&self) -> Option<Arc<Bitmap>> {
        lock(&self.slot).bitmap.clone()
    }

    pub fn is_decoded(&self) -> bool {
        lock(&self.slot).bitmap.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        lock(&self.slot).destroyed
    }

    /// Decode the region if no bitmap is held yet.
    ///
    /// Lock order is tile, then decoder, then tile again: the decoder lock is
    /// never held while waiting on a tile lock, and the second check keeps a
    /// concurrent caller from decoding the same identity twice.
    pub fn decode(&self, decoder: &SharedDecoder, format: PixelFormat) -> Result<DecodeOutcome> {
        if let Some(outcome) = self.settled_outcome() {
            return Ok(outcome);
        }

        let mut decoder = lock(decoder);
        if let Some(outcome) = self.settled_outcome() {
            return Ok(outcome);
        }
        let decoder = decoder.as_mut().ok_or(SubsamplingError::DecoderClosed)?;
        let bitmap = decoder.decode_region(self.key.rect, self.key.sample_size, format)?;

        let mut slot = lock(&self.slot);
        if slot.destroyed {
            trace!(tile = %self.key, "decoded after destroy, dropping bitmap");
            return Ok(DecodeOutcome::Destroyed);
        }
        slot.bitmap = Some(Arc::new(bitmap));
        trace!(tile = %self.key, "tile decoded");
        Ok(DecodeOutcome::Decoded)
    }

    fn settled_outcome(&self) -> Option<DecodeOutcome> {
        let slot = lock(&self.slot);
        if slot.destroyed {
            Some(DecodeOutcome::Destroyed)
        } else if slot.bitmap.is_some() {
            Some(DecodeOutcome::Cached)
        } else {
            None
        }
    }

    /// Release the bitmap but keep the identity usable for a later decode.
    pub fn recycle(&self) -> bool {
        lock(&self.slot).bitmap.take().is_some()
    }

    /// Release the bitmap and refuse any further decode.
    pub fn destroy(&self) {
        let mut slot = lock(&self.slot);
        slot.bitmap = None;
        slot.destroyed = true;
    }

    pub(crate) fn touch(&self, generation: u64) {
        self.last_used.store(generation, Ordering::Relaxed);
    }

    pub(crate) fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ReusableTile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReusableTile")
            .field("key", &self.key)
            .field("decoded", &self.is_decoded())
            .finish()
    }
}

/// Anything the renderer can draw: an optional bitmap placed in content space.
pub trait Tile {
    fn bitmap(&self) -> Option<Arc<Bitmap>>;

    /// Size of the source region the bitmap covers.
    fn src_size(&self) -> IntSize;

    /// Top-left corner in content coordinates.
    fn dst_offset(&self) -> IntOffset;

    fn dst_size(&self) -> IntSize;
}

/// A pooled tile placed at its destination for one planning pass.
#[derive(Clone, Debug)]
pub struct SnapshotTile {
    pub tile: Arc<ReusableTile>,
    pub dst_offset: IntOffset,
    pub dst_size: IntSize,
}

impl SnapshotTile {
    pub fn key(&self) -> TileKey {
        self.tile.key()
    }
}

/// Equal when both refer to the same pooled tile at the same destination.
impl PartialEq for SnapshotTile {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.tile, &other.tile)
            && self.dst_offset == other.dst_offset
            && self.dst_size == other.dst_size
    }
}

impl Eq for SnapshotTile {}

impl Tile for SnapshotTile {
    fn bitmap(&self) -> Option<Arc<Bitmap>> {
        self.tile.bitmap()
    }

    fn src_size(&self) -> IntSize {
        let rect = self.tile.rect();
        IntSize::new(rect.width().max(0) as u32, rect.height().max(0) as u32)
    }

    fn dst_offset(&self) -> IntOffset {
        self.dst_offset
    }

    fn dst_size(&self) -> IntSize {
        self.dst_size
    }
}

/// Low-resolution stand-in covering the whole content bounds.
#[derive(Clone, Debug)]
pub struct PreviewTile {
    pub bitmap: Arc<Bitmap>,
    pub dst_size: IntSize,
}

impl Tile for PreviewTile {
    fn bitmap(&self) -> Option<Arc<Bitmap>> {
        Some(self.bitmap.clone())
    }

    fn src_size(&self) -> IntSize {
        self.bitmap.size()
    }

    fn dst_offset(&self) -> IntOffset {
        IntOffset::ZERO
    }

    fn dst_size(&self) -> IntSize {
        self.dst_size
    }
}
