use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Args;
use image::Rgba;
use indicatif::{ProgressBar, ProgressStyle};
use subzoom_core::decoder::{ImageSource, PixelFileDecoderFactory};
use subzoom_core::events::LoadEvent;
use subzoom_core::render::{paint, RasterCanvas};
use subzoom_core::state::{SubsamplingOptions, SubsamplingState};

use super::view::{image_dimensions, ViewArgs};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub view: ViewArgs,

    /// Give up waiting for tiles after this many seconds
    #[arg(long, default_value = "60")]
    pub timeout: u64,

    /// Output file path
    #[arg(short, long, default_value = "render.png")]
    pub output: PathBuf,
}

pub fn run(args: &RenderArgs) -> Result<()> {
    let config = args.view.load_config()?;
    let source = image_dimensions(&args.view.file)?;
    let mut zoom = args.view.settled_zoom(&config, source)?;

    let (tx, rx) = mpsc::channel::<LoadEvent>();
    let path = args.view.file.clone();
    let mut state = SubsamplingState::new(
        move || Ok(ImageSource::File(path)),
        Arc::new(PixelFileDecoderFactory),
        SubsamplingOptions {
            source_size: source,
            tiles: config.tiles.clone(),
            events: Some(tx),
            ..Default::default()
        },
    )?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner} {msg} [{elapsed}]")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Loading source");

    let deadline = Instant::now() + Duration::from_secs(args.timeout);
    let mut tile_errors = 0usize;
    loop {
        // Sampled before planning so a plan made without the decoder never counts.
        let ready = state.is_decoder_ready();
        state.sync(&mut zoom);
        while let Ok(event) = rx.try_recv() {
            tracing::debug!(%event, "load event");
            match event {
                LoadEvent::SourceLoadError(msg) => bail!("Failed to load source: {msg}"),
                LoadEvent::TileLoadError { .. } => tile_errors += 1,
                LoadEvent::SourceLoaded { .. } => pb.set_message("Decoding tiles"),
                _ => {}
            }
        }

        let pending = state.pending_tiles();
        let settled = ready
            && state.display_tiles()[..] == pending[..]
            && (!pending.is_empty() || state.preview().is_some());
        if settled {
            break;
        }
        if Instant::now() >= deadline {
            bail!("Timed out after {}s waiting for tiles", args.timeout);
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    let snapshot = state.snapshot(&zoom);
    let (width, height) = args.view.viewport;
    let mut canvas = RasterCanvas::new(width, height, Rgba([0, 0, 0, 255]));
    let drawn = paint(&snapshot, &zoom, &mut canvas);
    pb.finish_with_message(format!("Painted {drawn} bitmaps"));

    canvas
        .into_image()
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    crate::summary::print_render_summary(
        &args.view.file,
        &args.output,
        &zoom,
        snapshot.display_tiles.len(),
        snapshot.preview_tile.is_some(),
        tile_errors,
    );
    state.destroy();

    Ok(())
}
