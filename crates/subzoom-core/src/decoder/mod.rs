//! Region decoder capability: report source dimensions and decode
//! sub-rectangles at an integer downsample factor.

mod pixel_file;

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use image::DynamicImage;

use crate::error::Result;
use crate::geometry::{IntRect, IntSize};

pub use pixel_file::{PixelFileDecoder, PixelFileDecoderFactory};

/// Pixel layout requested from a decoder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    #[default]
    Rgba8,
    Gray8,
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgba8 => write!(f, "RGBA 8-bit"),
            Self::Gray8 => write!(f, "Gray 8-bit"),
        }
    }
}

/// Decoded pixels, independently owned once returned by a decoder.
#[derive(Clone, Debug)]
pub struct Bitmap {
    image: DynamicImage,
}

impl Bitmap {
    pub fn new(image: DynamicImage) -> Self {
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn size(&self) -> IntSize {
        IntSize::new(self.width(), self.height())
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_image(self) -> DynamicImage {
        self.image
    }

    pub fn byte_size(&self) -> usize {
        self.image.as_bytes().len()
    }
}

impl From<DynamicImage> for Bitmap {
    fn from(image: DynamicImage) -> Self {
        Self::new(image)
    }
}

/// Decodes arbitrary sub-rectangles of one source image.
///
/// Callers serialize access: a decoder is never invoked concurrently.
/// Bitmaps already returned stay valid after later calls and after `close`.
pub trait RegionDecoder: Send {
    /// Native width of the source, or 0 if not known yet.
    fn width(&self) -> u32;

    /// Native height of the source, or 0 if not known yet.
    fn height(&self) -> u32;

    /// Decode `rect` (source pixels) downsampled by `sample_size`.
    fn decode_region(&mut self, rect: IntRect, sample_size: u32, format: PixelFormat)
        -> Result<Bitmap>;

    /// Release underlying resources. Idempotent; later decodes fail.
    fn close(&mut self);

    fn is_closed(&self) -> bool;

    fn size(&self) -> IntSize {
        IntSize::new(self.width(), self.height())
    }
}

/// Decoder shared between loaders and decode passes. `None` once closed or
/// before the source has loaded.
pub type SharedDecoder = Mutex<Option<Box<dyn RegionDecoder>>>;

/// Encoded source bytes handed to a [`DecoderFactory`].
#[derive(Clone, Debug)]
pub enum ImageSource {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl ImageSource {
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Memory(bytes.into())
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory(bytes) => write!(f, "<{} bytes in memory>", bytes.len()),
        }
    }
}

/// Creates a region decoder for a loaded source.
pub trait DecoderFactory: Send + Sync {
    fn create(&self, source: &ImageSource) -> Result<Box<dyn RegionDecoder>>;
}

impl<F> DecoderFactory for F
where
    F: Fn(&ImageSource) -> Result<Box<dyn RegionDecoder>> + Send + Sync,
{
    fn create(&self, source: &ImageSource) -> Result<Box<dyn RegionDecoder>> {
        self(source)
    }
}
