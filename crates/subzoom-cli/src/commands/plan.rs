use anyhow::Result;
use clap::Args;
use subzoom_core::geometry::IntSize;
use subzoom_core::tiles::{plan_tiles, sample_size_for, PlanInputs, TilePool};

use super::view::{image_dimensions, ViewArgs};

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub view: ViewArgs,

    /// Assume a preview of this many pixels per side is loaded
    #[arg(long)]
    pub preview: Option<u32>,
}

pub fn run(args: &PlanArgs) -> Result<()> {
    let config = args.view.load_config()?;
    config.tiles.validate()?;
    let source = image_dimensions(&args.view.file)?;
    let zoom = args.view.settled_zoom(&config, source)?;

    let preview_size = args.preview.map(|longest| {
        let ratio = source.aspect_ratio();
        if ratio >= 1.0 {
            IntSize::new(longest, (longest as f64 / ratio).round() as u32)
        } else {
            IntSize::new((longest as f64 * ratio).round() as u32, longest)
        }
    });
    let inputs = PlanInputs::from_zoom(&zoom, source, preview_size, true);
    let pool = TilePool::default();
    let tiles = plan_tiles(&inputs, &pool, &config.tiles);

    let bounds = inputs.transformed_content_bounds;
    let sample_size = sample_size_for(source, bounds.width(), bounds.height());
    crate::summary::print_plan_summary(&args.view.file, source, &zoom, sample_size, &tiles);

    Ok(())
}
