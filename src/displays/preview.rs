use std::fs;
use std::path::PathBuf;

use image::{Rgb, RgbImage};
use tracing::info;

use super::EpdDriver;
use super::error::{DriverError, Result};
use crate::convert::Frame;
use crate::convert::dither::acep_palette;
use crate::panel::PanelSpec;

const PREVIEW_FILE: &str = "frame.png";

/// Stand-in panel that renders every frame to a PNG. Lets the service run without hardware.
pub struct PreviewDriver {
    panel: PanelSpec,
    out_dir: PathBuf,
    awake: bool,
}

impl PreviewDriver {
    pub fn new(panel: PanelSpec, out_dir: impl Into<PathBuf>) -> Result<Self> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir)?;
        Ok(Self {
            panel,
            out_dir,
            awake: false,
        })
    }

    pub fn output_path(&self) -> PathBuf {
        self.out_dir.join(PREVIEW_FILE)
    }

    fn write(&self, frame: &Frame) -> Result<()> {
        if !self.awake {
            // Real controllers ignore data sent while asleep.
            return Err(DriverError::Io(std::io::Error::other(
                "preview panel used without init",
            )));
        }
        let path = self.output_path();
        render_frame(frame).save(&path)?;
        info!(path = %path.display(), "Preview frame written");
        Ok(())
    }
}

impl EpdDriver for PreviewDriver {
    fn panel(&self) -> PanelSpec {
        self.panel
    }

    fn init(&mut self) -> Result<()> {
        self.awake = true;
        Ok(())
    }

    fn display(&mut self, frame: &Frame) -> Result<()> {
        if !frame.fits(&self.panel) {
            return Err(DriverError::UnsupportedFrame {
                expected: self.panel.color_mode,
                received: frame.color_mode(),
            });
        }
        self.write(frame)
    }

    fn clear(&mut self) -> Result<()> {
        self.write(&Frame::blank(&self.panel))
    }

    fn sleep(&mut self) -> Result<()> {
        self.awake = false;
        Ok(())
    }
}

/// Renders a frame the way the glass would show it. Red ink wins over black.
pub fn render_frame(frame: &Frame) -> RgbImage {
    let (w, h) = frame.dimensions();
    match frame {
        Frame::TwoColor { primary, secondary } => {
            RgbImage::from_fn(w as u32, h as u32, |x, y| {
                let (x, y) = (x as usize, y as usize);
                if !secondary.is_white(x, y) {
                    Rgb([255, 0, 0])
                } else if !primary.is_white(x, y) {
                    Rgb([0, 0, 0])
                } else {
                    Rgb([255, 255, 255])
                }
            })
        }
        Frame::Palette(plane) => {
            let palette = acep_palette(0.0);
            RgbImage::from_fn(w as u32, h as u32, |x, y| {
                let index = plane.get(x as usize, y as usize) as usize;
                let entry = palette.get(index).copied().unwrap_or(palette[1]);
                Rgb(entry.map(|c| c as u8))
            })
        }
    }
}
