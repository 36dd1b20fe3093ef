//! Tiling: which source regions to decode at which sample size, the pool
//! that shares decoded regions across passes, and the background pass runner.

mod planner;
mod pool;
mod scheduler;
mod tile;

pub use planner::{plan_tiles, preview_sample_size, sample_size_for, slice_count, PlanInputs};
pub use pool::TilePool;
pub use scheduler::{DecodeContext, TileScheduler};
pub use tile::{DecodeOutcome, PreviewTile, ReusableTile, SnapshotTile, Tile, TileKey};
