use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{DynamicImage, Rgba, RgbaImage};
use kurbo::Size;
use tempfile::NamedTempFile;

use subzoom_core::decoder::{
    Bitmap, DecoderFactory, ImageSource, PixelFormat, RegionDecoder,
};
use subzoom_core::error::{Result, SubsamplingError};
use subzoom_core::events::LoadEvent;
use subzoom_core::geometry::IntRect;
use subzoom_core::zoom::ZoomState;

/// Counters shared between a test and the fake decoders it hands out.
#[derive(Clone, Default)]
pub struct DecoderTally {
    pub calls: Arc<AtomicUsize>,
    pub calls_after_close: Arc<AtomicUsize>,
    pub closed: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl DecoderTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_after_close(&self) -> usize {
        self.calls_after_close.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn decoder(&self, width: u32, height: u32, delay: Duration) -> CountingDecoder {
        CountingDecoder {
            width,
            height,
            delay,
            fail_sample_size: None,
            tally: self.clone(),
        }
    }

    /// Factory producing one counting decoder per source.
    pub fn factory(&self, width: u32, height: u32, delay: Duration) -> Arc<dyn DecoderFactory> {
        let tally = self.clone();
        Arc::new(move |_: &ImageSource| -> Result<Box<dyn RegionDecoder>> {
            Ok(Box::new(tally.decoder(width, height, delay)))
        })
    }
}

/// Fake region decoder: blank bitmaps of the right size, optional delay,
/// and errors for every call made after `close`.
pub struct CountingDecoder {
    width: u32,
    height: u32,
    delay: Duration,
    fail_sample_size: Option<u32>,
    tally: DecoderTally,
}

impl CountingDecoder {
    pub fn failing_at(mut self, sample_size: u32) -> Self {
        self.fail_sample_size = Some(sample_size);
        self
    }
}

impl RegionDecoder for CountingDecoder {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn decode_region(&mut self, rect: IntRect, sample_size: u32, _: PixelFormat) -> Result<Bitmap> {
        if self.tally.is_closed() {
            self.tally.calls_after_close.fetch_add(1, Ordering::SeqCst);
            return Err(SubsamplingError::DecoderClosed);
        }
        let in_flight = self.tally.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.tally.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.tally.calls.fetch_add(1, Ordering::SeqCst);
        self.tally.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_sample_size == Some(sample_size) {
            return Err(SubsamplingError::Decode(format!("refusing {rect}")));
        }
        let w = (rect.width().max(1) as u32).div_ceil(sample_size);
        let h = (rect.height().max(1) as u32).div_ceil(sample_size);
        Ok(Bitmap::new(DynamicImage::new_rgba8(w, h)))
    }

    fn close(&mut self) {
        self.tally.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.tally.is_closed()
    }
}

/// Horizontal red ramp, vertical green ramp, constant blue.
pub fn gradient_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([
            (x * 255 / width.max(2).saturating_sub(1).max(1)) as u8,
            (y * 255 / height.max(2).saturating_sub(1).max(1)) as u8,
            128,
            255,
        ])
    })
}

/// Write a gradient PNG to a temporary file that lives as long as the handle.
pub fn write_test_png(width: u32, height: u32) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .unwrap();
    gradient_image(width, height).save(file.path()).unwrap();
    file
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(gradient_image(width, height))
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

pub fn zoom_with_layout(width: f64, height: f64, aspect_ratio: f64) -> ZoomState {
    let mut zoom = ZoomState::default();
    zoom.set_layout_size(Size::new(width, height));
    zoom.set_content_aspect_ratio(aspect_ratio);
    zoom
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub fn drain_events(rx: &mpsc::Receiver<LoadEvent>) -> Vec<LoadEvent> {
    rx.try_iter().collect()
}

/// Short name of an event, for order assertions.
pub fn event_name(event: &LoadEvent) -> &'static str {
    match event {
        LoadEvent::Loading => "loading",
        LoadEvent::SourceLoaded { .. } => "source",
        LoadEvent::SourceLoadError(_) => "source-error",
        LoadEvent::PreviewLoaded { .. } => "preview",
        LoadEvent::PreviewLoadError(_) => "preview-error",
        LoadEvent::TileLoadError { .. } => "tile-error",
        LoadEvent::DisposePreview(_) => "dispose-preview",
        LoadEvent::Destroyed => "destroyed",
    }
}

/// Seeded linear congruential generator for reproducible randomized tests.
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 32) as u32
    }

    pub fn gen_range_usize(&mut self, upper_exclusive: usize) -> usize {
        if upper_exclusive == 0 {
            return 0;
        }
        self.next_u32() as usize % upper_exclusive
    }

    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.gen_range_usize(i + 1);
            items.swap(i, j);
        }
    }
}
