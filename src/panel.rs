use std::fmt;

use image::{RgbImage, imageops};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    TwoColor,
    SevenColorPalette,
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColorMode::TwoColor => write!(f, "black/red/white"),
            ColorMode::SevenColorPalette => write!(f, "7-colour ACeP"),
        }
    }
}

/// Physical panel geometry and colour capability, fixed for the process lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelSpec {
    pub width: u16,
    pub height: u16,
    pub color_mode: ColorMode,
    /// Fill colour for the letterbox margins when an image is padded to the panel.
    pub background: [u8; 3],
}

impl PanelSpec {
    pub fn two_color(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            color_mode: ColorMode::TwoColor,
            background: [255, 255, 255],
        }
    }

    pub fn seven_color(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            color_mode: ColorMode::SevenColorPalette,
            background: [0, 0, 0],
        }
    }

    pub fn with_background(mut self, background: [u8; 3]) -> Self {
        self.background = background;
        self
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl fmt::Display for PanelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.color_mode)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Anything other than a canonical quarter turn maps to `Deg0`.
    pub fn from_degrees(degrees: u16) -> Self {
        match degrees {
            90 => Rotation::Deg90,
            180 => Rotation::Deg180,
            270 => Rotation::Deg270,
            _ => Rotation::Deg0,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::Deg270 => 270,
        }
    }

    pub fn apply(self, image: RgbImage) -> RgbImage {
        match self {
            Rotation::Deg0 => image,
            Rotation::Deg90 => imageops::rotate90(&image),
            Rotation::Deg180 => imageops::rotate180(&image),
            Rotation::Deg270 => imageops::rotate270(&image),
        }
    }
}
