use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use subzoom_core::consts::PREVIEW_PIXEL_BUDGET;
use subzoom_core::geometry::IntSize;
use subzoom_core::tiles::preview_sample_size;

use super::view::image_dimensions;

#[derive(Args)]
pub struct InfoArgs {
    /// Input image file
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let size = image_dimensions(&args.file)?;
    let format = image::ImageFormat::from_path(&args.file)
        .map(|f| format!("{f:?}"))
        .unwrap_or_else(|_| "unknown".into());
    let bytes = std::fs::metadata(&args.file)
        .with_context(|| format!("Failed to stat {}", args.file.display()))?
        .len();

    println!("File:        {}", args.file.display());
    println!("Format:      {}", format);
    println!("Dimensions:  {}", size);
    println!("Aspect:      {:.4}", size.aspect_ratio());
    println!("File size:   {:.1} MB", bytes as f64 / (1024.0 * 1024.0));

    let decoded_mb = size.area() as f64 * 4.0 / (1024.0 * 1024.0);
    println!("Decoded:     {:.1} MB (RGBA)", decoded_mb);

    let preview = preview_sample_size(size, PREVIEW_PIXEL_BUDGET);
    println!("Preview:     1/{} ({})", preview, sampled(size, preview));

    println!("Sample sizes:");
    let mut sample_size = 1u32;
    loop {
        let level = sampled(size, sample_size);
        println!("  {:>5}  {}", format!("1/{sample_size}"), level);
        if (level.width <= 1 && level.height <= 1) || sample_size >= 1 << 16 {
            break;
        }
        sample_size *= 2;
    }

    Ok(())
}

fn sampled(size: IntSize, sample_size: u32) -> IntSize {
    IntSize::new(
        size.width.div_ceil(sample_size),
        size.height.div_ceil(sample_size),
    )
}
