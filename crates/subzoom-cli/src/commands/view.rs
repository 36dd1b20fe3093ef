use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use kurbo::{Size, Vec2};
use subzoom_core::config::ViewerConfig;
use subzoom_core::geometry::IntSize;
use subzoom_core::zoom::{GestureSource, ZoomState};

/// Frame step used to settle animations headlessly.
const FRAME: Duration = Duration::from_millis(16);
/// Upper bound on settle frames (about ten seconds of animation).
const MAX_SETTLE_FRAMES: usize = 600;

/// Image plus the view to look at it through.
#[derive(Args)]
pub struct ViewArgs {
    /// Input image file
    pub file: PathBuf,

    /// Viewport size as WIDTHxHEIGHT
    #[arg(long, default_value = "1000x1000", value_parser = parse_viewport)]
    pub viewport: (u32, u32),

    /// Zoom scale, clamped to the configured limits
    #[arg(long, default_value = "1.0")]
    pub scale: f64,

    /// Pan in viewport pixels as X,Y, clamped to the content edges
    #[arg(long, default_value = "0,0", value_parser = parse_pan, allow_hyphen_values = true)]
    pub pan: (f64, f64),

    /// Viewer config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl ViewArgs {
    pub fn load_config(&self) -> Result<ViewerConfig> {
        match self.config {
            Some(ref path) => ViewerConfig::load(path)
                .with_context(|| format!("Invalid viewer config {}", path.display())),
            None => Ok(ViewerConfig::default()),
        }
    }

    /// Zoom state at rest after applying the requested scale and pan as one gesture.
    pub fn settled_zoom(&self, config: &ViewerConfig, source: IntSize) -> Result<ZoomState> {
        let mut zoom = ZoomState::with_animation(&config.zoom, config.animation.clone())?;
        let (width, height) = self.viewport;
        zoom.set_layout_size(Size::new(width as f64, height as f64));
        zoom.set_content_aspect_ratio(source.aspect_ratio());

        let center = zoom.layout_bounds().center();
        let pan = Vec2::new(self.pan.0, self.pan.1);
        zoom.on_gesture(center, pan, self.scale, GestureSource::Gesture);
        zoom.on_gesture_end(Vec2::ZERO);
        for _ in 0..MAX_SETTLE_FRAMES {
            if !zoom.tick(FRAME) {
                break;
            }
        }
        Ok(zoom)
    }
}

pub fn image_dimensions(path: &Path) -> Result<IntSize> {
    let (width, height) = image::ImageReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?
        .with_guessed_format()?
        .into_dimensions()
        .with_context(|| format!("Failed to read dimensions of {}", path.display()))?;
    Ok(IntSize::new(width, height))
}

fn parse_viewport(s: &str) -> std::result::Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: u32 = w.trim().parse().map_err(|e| format!("bad width '{w}': {e}"))?;
    let h: u32 = h.trim().parse().map_err(|e| format!("bad height '{h}': {e}"))?;
    if w == 0 || h == 0 {
        return Err("viewport must be non-empty".into());
    }
    Ok((w, h))
}

fn parse_pan(s: &str) -> std::result::Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x '{x}': {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y '{y}': {e}"))?;
    Ok((x, y))
}
