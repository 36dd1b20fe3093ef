pub mod config;
pub mod info;
pub mod plan;
pub mod render;
mod view;
