use std::io::{BufRead, Cursor, Seek};

use image::{ColorType, DynamicImage, GrayImage, ImageDecoder, ImageReader, RgbaImage};
use memmap2::{Mmap, MmapMut};
use rayon::prelude::*;
use tracing::{debug, info};

use super::{Bitmap, DecoderFactory, ImageSource, PixelFormat, RegionDecoder};
use crate::consts::{LUMINANCE_B, LUMINANCE_G, LUMINANCE_R, PARALLEL_PIXEL_THRESHOLD};
use crate::error::{Result, SubsamplingError};
use crate::geometry::IntRect;

/// Interleaved sample layout of the spilled pixel file.
#[derive(Clone, Copy, Debug)]
struct SampleLayout {
    channels: usize,
    bytes_per_sample: usize,
    has_color: bool,
    has_alpha: bool,
}

impl SampleLayout {
    fn from_color_type(color_type: ColorType) -> Result<Self> {
        let (channels, bytes_per_sample, has_color, has_alpha) = match color_type {
            ColorType::L8 => (1, 1, false, false),
            ColorType::La8 => (2, 1, false, true),
            ColorType::Rgb8 => (3, 1, true, false),
            ColorType::Rgba8 => (4, 1, true, true),
            ColorType::L16 => (1, 2, false, false),
            ColorType::La16 => (2, 2, false, true),
            ColorType::Rgb16 => (3, 2, true, false),
            ColorType::Rgba16 => (4, 2, true, true),
            other => {
                return Err(SubsamplingError::UnsupportedColorType(format!("{other:?}")));
            }
        };
        Ok(Self {
            channels,
            bytes_per_sample,
            has_color,
            has_alpha,
        })
    }

    fn bytes_per_pixel(&self) -> usize {
        self.channels * self.bytes_per_sample
    }

    /// 8-bit sample `index` of the pixel starting at `px`. 16-bit samples keep the high byte.
    fn sample(&self, px: &[u8], index: usize) -> u32 {
        if self.bytes_per_sample == 1 {
            px[index] as u32
        } else {
            let offset = index * 2;
            (u16::from_ne_bytes([px[offset], px[offset + 1]]) >> 8) as u32
        }
    }

    fn rgba(&self, px: &[u8]) -> [u32; 4] {
        let (r, g, b) = if self.has_color {
            (self.sample(px, 0), self.sample(px, 1), self.sample(px, 2))
        } else {
            let l = self.sample(px, 0);
            (l, l, l)
        };
        let a = if self.has_alpha {
            self.sample(px, self.channels - 1)
        } else {
            255
        };
        [r, g, b, a]
    }
}

/// Per-channel running sum over the source pixels of one output pixel.
/// Sums are 64-bit so very coarse sample sizes cannot overflow them.
#[derive(Clone, Copy, Debug, Default)]
struct BoxSum {
    acc: [u64; 4],
    count: u64,
}

impl BoxSum {
    fn add(&mut self, rgba: [u32; 4]) {
        for (acc, value) in self.acc.iter_mut().zip(rgba) {
            *acc += u64::from(value);
        }
        self.count += 1;
    }

    fn average(&self) -> [u32; 4] {
        let count = self.count.max(1);
        self.acc.map(|acc| (acc / count) as u32)
    }
}

/// Region decoder that decodes the whole source once into a memory-mapped
/// temporary pixel file and serves region reads from it.
///
/// Only the encoded bytes and the spill file are resident; region reads touch
/// just the rows they need.
pub struct PixelFileDecoder {
    width: u32,
    height: u32,
    layout: SampleLayout,
    pixels: Option<Mmap>,
}

impl PixelFileDecoder {
    pub fn open(source: &ImageSource) -> Result<Self> {
        info!(source = %source, "decoding source into pixel file");
        match source {
            ImageSource::File(path) => Self::from_reader(ImageReader::open(path)?),
            ImageSource::Memory(bytes) => Self::from_reader(ImageReader::new(Cursor::new(bytes.clone()))),
        }
    }

    fn from_reader<R: BufRead + Seek>(reader: ImageReader<R>) -> Result<Self> {
        let mut reader = reader.with_guessed_format()?;
        reader.no_limits();
        let decoder = reader.into_decoder()?;
        let (width, height) = decoder.dimensions();
        let layout = SampleLayout::from_color_type(decoder.color_type())?;
        let total_bytes = decoder.total_bytes() as usize;
        if width == 0 || height == 0 || total_bytes == 0 {
            return Err(SubsamplingError::Decode(format!(
                "source has no pixels ({width}x{height})"
            )));
        }

        let file = tempfile::tempfile()?;
        file.set_len(total_bytes as u64)?;
        let mut map = unsafe { MmapMut::map_mut(&file)? };
        decoder.read_image(&mut map[..])?;
        let pixels = map.make_read_only()?;

        debug!(width, height, bytes = total_bytes, "pixel file ready");
        Ok(Self {
            width,
            height,
            layout,
            pixels: Some(pixels),
        })
    }

    fn row<'a>(&self, pixels: &'a [u8], y: usize) -> &'a [u8] {
        let stride = self.width as usize * self.layout.bytes_per_pixel();
        &pixels[y * stride..(y + 1) * stride]
    }

    /// Box-filter one output row: every output pixel averages the up to
    /// `sample_size x sample_size` source pixels it covers.
    fn fill_row(
        &self,
        pixels: &[u8],
        rect: IntRect,
        sample_size: usize,
        out_y: usize,
        out_row: &mut [u8],
        format: PixelFormat,
    ) {
        let bpp = self.layout.bytes_per_pixel();
        let y0 = rect.top as usize + out_y * sample_size;
        let y1 = (y0 + sample_size).min(rect.bottom as usize);
        let out_channels = match format {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        };

        for (out_x, out_px) in out_row.chunks_exact_mut(out_channels).enumerate() {
            let x0 = rect.left as usize + out_x * sample_size;
            let x1 = (x0 + sample_size).min(rect.right as usize);
            let mut sum = BoxSum::default();
            for y in y0..y1 {
                let row = self.row(pixels, y);
                for x in x0..x1 {
                    sum.add(self.layout.rgba(&row[x * bpp..(x + 1) * bpp]));
                }
            }
            let avg = sum.average();
            match format {
                PixelFormat::Rgba8 => {
                    for c in 0..4 {
                        out_px[c] = avg[c] as u8;
                    }
                }
                PixelFormat::Gray8 => {
                    let luma = LUMINANCE_R * avg[0] as f32
                        + LUMINANCE_G * avg[1] as f32
                        + LUMINANCE_B * avg[2] as f32;
                    out_px[0] = luma.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
    }
}

impl RegionDecoder for PixelFileDecoder {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn decode_region(
        &mut self,
        rect: IntRect,
        sample_size: u32,
        format: PixelFormat,
    ) -> Result<Bitmap> {
        let pixels = self.pixels.as_ref().ok_or(SubsamplingError::DecoderClosed)?;
        if sample_size == 0 {
            return Err(SubsamplingError::InvalidSampleSize(sample_size));
        }
        let full = IntRect::new(0, 0, self.width as i32, self.height as i32);
        let clipped = rect.intersect(&full);
        if clipped.is_empty() {
            return Err(SubsamplingError::InvalidRegion {
                rect,
                width: self.width,
                height: self.height,
            });
        }

        let s = sample_size as usize;
        let out_w = (clipped.width() as usize).div_ceil(s);
        let out_h = (clipped.height() as usize).div_ceil(s);
        let out_channels = match format {
            PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        };
        let mut buf = vec![0u8; out_w * out_h * out_channels];
        let row_len = out_w * out_channels;
        let this = &*self;

        if out_w * out_h >= PARALLEL_PIXEL_THRESHOLD {
            buf.par_chunks_mut(row_len)
                .enumerate()
                .for_each(|(y, row)| this.fill_row(pixels, clipped, s, y, row, format));
        } else {
            for (y, row) in buf.chunks_mut(row_len).enumerate() {
                this.fill_row(pixels, clipped, s, y, row, format);
            }
        }

        let image = match format {
            PixelFormat::Rgba8 => RgbaImage::from_raw(out_w as u32, out_h as u32, buf)
                .map(DynamicImage::ImageRgba8),
            PixelFormat::Gray8 => GrayImage::from_raw(out_w as u32, out_h as u32, buf)
                .map(DynamicImage::ImageLuma8),
        }
        .ok_or_else(|| SubsamplingError::Decode("region buffer size mismatch".into()))?;
        Ok(Bitmap::new(image))
    }

    fn close(&mut self) {
        if self.pixels.take().is_some() {
            debug!("pixel file released");
        }
    }

    fn is_closed(&self) -> bool {
        self.pixels.is_none()
    }
}

/// Factory producing [`PixelFileDecoder`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct PixelFileDecoderFactory;

impl DecoderFactory for PixelFileDecoderFactory {
    fn create(&self, source: &ImageSource) -> Result<Box<dyn RegionDecoder>> {
        Ok(Box::new(PixelFileDecoder::open(source)?))
    }
}
