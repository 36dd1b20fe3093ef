//! Viewport pan/zoom state machine.

pub mod animation;
mod source;
mod state;

pub use source::GestureSource;
pub use state::ZoomState;
