use std::path::Path;

use console::Style;
use subzoom_core::geometry::IntSize;
use subzoom_core::tiles::{SnapshotTile, Tile};
use subzoom_core::zoom::ZoomState;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    dim: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            dim: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn print_view(s: &Styles, zoom: &ZoomState) {
    let transform = zoom.transform();
    let layout = zoom.layout_size();
    println!(
        "  {:<14}{}",
        s.label.apply_to("Viewport"),
        s.value.apply_to(format!("{}x{}", layout.width, layout.height))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Scale"),
        s.value.apply_to(format!("{:.3}", transform.scale()))
    );
    println!(
        "  {:<14}{}",
        s.label.apply_to("Translation"),
        s.value.apply_to(format!(
            "{:.1}, {:.1}",
            transform.translation_x, transform.translation_y
        ))
    );
    let bounds = zoom.transformed_content_bounds();
    println!(
        "  {:<14}{}",
        s.label.apply_to("On screen"),
        s.value.apply_to(format!(
            "{:.1}, {:.1} .. {:.1}, {:.1}",
            bounds.x0, bounds.y0, bounds.x1, bounds.y1
        ))
    );
}

pub fn print_plan_summary(
    file: &Path,
    source: IntSize,
    zoom: &ZoomState,
    sample_size: u32,
    tiles: &[SnapshotTile],
) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Tile Plan"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(9)));
    println!();
    println!("  {:<14}{}", s.label.apply_to("Input"), s.path.apply_to(file.display()));
    println!("  {:<14}{}", s.label.apply_to("Source"), s.value.apply_to(source));
    print_view(&s, zoom);
    println!(
        "  {:<14}{}",
        s.label.apply_to("Sample size"),
        s.value.apply_to(sample_size)
    );
    println!();

    println!("  {}", s.header.apply_to(format!("Tiles ({})", tiles.len())));
    if tiles.is_empty() {
        println!("    {}", s.dim.apply_to("none, the preview covers the view"));
        return;
    }
    for (i, tile) in tiles.iter().enumerate() {
        let offset = tile.dst_offset();
        println!(
            "    {:<4}{} {} {}",
            s.label.apply_to(i),
            s.value.apply_to(tile.tile.rect()),
            s.dim.apply_to(format!("@{}", tile.tile.sample_size())),
            s.label.apply_to(format!(
                "-> {},{} {}",
                offset.x,
                offset.y,
                tile.dst_size()
            ))
        );
    }
}

pub fn print_render_summary(
    file: &Path,
    output: &Path,
    zoom: &ZoomState,
    tiles: usize,
    preview: bool,
    tile_errors: usize,
) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Render"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(6)));
    println!();
    println!("  {:<14}{}", s.label.apply_to("Input"), s.path.apply_to(file.display()));
    println!("  {:<14}{}", s.label.apply_to("Output"), s.path.apply_to(output.display()));
    print_view(&s, zoom);
    println!("  {:<14}{}", s.label.apply_to("Tiles"), s.value.apply_to(tiles));
    println!(
        "  {:<14}{}",
        s.label.apply_to("Preview"),
        if preview {
            s.value.apply_to("yes")
        } else {
            s.dim.apply_to("no")
        }
    );
    if tile_errors > 0 {
        println!(
            "  {:<14}{}",
            s.label.apply_to("Tile errors"),
            s.dim.apply_to(tile_errors)
        );
    }
}
