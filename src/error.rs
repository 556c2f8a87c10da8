use thiserror::Error;

use crate::displays::DriverError;
use crate::panel::{ColorMode, PanelSpec};

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid image dimensions: expected {expected:?}, got {received:?}")]
    InvalidImageDimensions {
        expected: (u16, u16),
        received: (u32, u32),
    },

    #[error("Frame {received:?} ({mode}) does not fit panel {expected}")]
    FrameMismatch {
        expected: PanelSpec,
        received: (u16, u16),
        mode: ColorMode,
    },

    #[error("No plane provided")]
    MissingPlanes,

    #[error("Palette panels take a single prepared image, got both black and red")]
    AmbiguousPlanes,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid upload: {0}")]
    Validation(String),

    #[error("Camera capture failed: {0}")]
    Capture(String),

    #[error("Conversion failed: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Hardware error: {0}")]
    Hardware(#[from] DriverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Job panicked: {0}")]
    Panicked(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Hardware faults leave the panel in an unknown state; everything else only costs one job.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Hardware(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
