pub mod config;
pub mod consts;
pub mod decoder;
pub mod error;
pub mod events;
pub mod geometry;
pub mod gesture;
pub mod render;
pub mod state;
mod sync;
pub mod tiles;
pub mod transform;
pub mod zoom;
