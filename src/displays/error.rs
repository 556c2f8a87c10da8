use std::time::Duration;

use thiserror::Error;

use crate::panel::ColorMode;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(target_os = "linux")]
    #[error("GPIO error: {0}")]
    Gpio(#[from] gpio_cdev::errors::Error),

    #[error("Timed out waiting for {0} after {1:?}")]
    Timeout(&'static str, Duration),

    #[error("Invalid buffer size: expected {expected}, got {received}")]
    InvalidBufferSize { expected: usize, received: usize },

    #[error("Unsupported resolution {0}x{1}")]
    UnsupportedResolution(u16, u16),

    #[error("Driver for {expected} panels cannot show a {received} frame")]
    UnsupportedFrame {
        expected: ColorMode,
        received: ColorMode,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, DriverError>;
