use thiserror::Error;

use crate::geometry::IntRect;

#[derive(Error, Debug)]
pub enum SubsamplingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid scale limits: {0}")]
    InvalidScaleLimits(String),

    #[error("Region {rect} is outside the {width}x{height} source")]
    InvalidRegion { rect: IntRect, width: u32, height: u32 },

    #[error("Invalid sample size {0}: must be at least 1")]
    InvalidSampleSize(u32),

    #[error("Unsupported color type: {0}")]
    UnsupportedColorType(String),

    #[error("Region decoder is closed")]
    DecoderClosed,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Source error: {0}")]
    Source(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SubsamplingError>;
