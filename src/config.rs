use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::convert::{
    ConvertOptions, DEFAULT_SATURATION, DEFAULT_THRESHOLD, DEFAULT_THRESHOLD_OFFSET,
};
use crate::error::{Error, Result};
use crate::panel::PanelSpec;

/// The panels this service can drive, plus a file-backed preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum PanelKind {
    /// Waveshare 4.2" V2, 400x300 black/red/white
    #[serde(rename = "epd4in2b-v2")]
    #[value(name = "epd4in2b-v2")]
    Epd4in2bV2,
    /// Inky Impression 5.7", 600x448 seven-colour
    #[serde(rename = "uc8159-600x448")]
    #[value(name = "uc8159-600x448")]
    Impression57,
    /// Inky Impression 4", 640x400 seven-colour
    #[serde(rename = "uc8159-640x400")]
    #[value(name = "uc8159-640x400")]
    Impression4,
    /// No hardware; renders each frame to a PNG at 400x300 black/red/white
    #[serde(rename = "preview")]
    #[value(name = "preview")]
    Preview,
    /// No hardware; renders seven-colour frames at 600x448
    #[serde(rename = "preview-acep")]
    #[value(name = "preview-acep")]
    PreviewAcep,
}

impl PanelKind {
    pub fn spec(self) -> PanelSpec {
        match self {
            PanelKind::Epd4in2bV2 | PanelKind::Preview => PanelSpec::two_color(400, 300),
            PanelKind::Impression57 | PanelKind::PreviewAcep => PanelSpec::seven_color(600, 448),
            PanelKind::Impression4 => PanelSpec::seven_color(640, 400),
        }
    }
}

impl fmt::Display for PanelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PanelKind::Epd4in2bV2 => "epd4in2b-v2",
            PanelKind::Impression57 => "uc8159-600x448",
            PanelKind::Impression4 => "uc8159-640x400",
            PanelKind::Preview => "preview",
            PanelKind::PreviewAcep => "preview-acep",
        };
        f.write_str(name)
    }
}

/// Everything the service reads at startup. Every field has a default, so a
/// config file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub panel: PanelKind,
    /// Overrides the letterbox colour of the panel.
    pub background: Option<[u8; 3]>,
    pub uploads_dir: PathBuf,
    pub slideshow_dir: PathBuf,
    pub preview_dir: PathBuf,
    pub cadence_secs: u64,
    pub banner: bool,
    pub threshold: u8,
    pub threshold_offset: u8,
    pub saturation: f32,
    pub allowed_extensions: Vec<String>,
    pub prepared_extensions: Vec<String>,
    /// Program and leading arguments; the capture path is appended. Empty disables the camera.
    pub camera_command: Vec<String>,
    pub max_upload_bytes: usize,
    pub spi_path: String,
    pub gpio_chip: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            panel: PanelKind::Epd4in2bV2,
            background: None,
            uploads_dir: PathBuf::from("uploads"),
            slideshow_dir: PathBuf::from("slideshow"),
            preview_dir: PathBuf::from("preview"),
            cadence_secs: 300,
            banner: true,
            threshold: DEFAULT_THRESHOLD,
            threshold_offset: DEFAULT_THRESHOLD_OFFSET,
            saturation: DEFAULT_SATURATION,
            allowed_extensions: ["png", "jpg", "jpeg", "webp", "bmp"]
                .map(String::from)
                .to_vec(),
            prepared_extensions: vec!["bmp".to_string()],
            camera_command: ["libcamera-still", "--nopreview", "--immediate", "-o"]
                .map(String::from)
                .to_vec(),
            max_upload_bytes: 25 * 1024 * 1024,
            spi_path: "/dev/spidev0.0".to_string(),
            gpio_chip: "/dev/gpiochip0".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Config = serde_json::from_slice(&data)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cadence_secs == 0 {
            return Err(Error::Config("cadence_secs must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.saturation) {
            return Err(Error::Config(format!(
                "saturation {} outside 0.0..=1.0",
                self.saturation
            )));
        }
        if self.allowed_extensions.is_empty() || self.prepared_extensions.is_empty() {
            return Err(Error::Config("extension allow-lists must not be empty".into()));
        }
        if self.max_upload_bytes == 0 {
            return Err(Error::Config("max_upload_bytes must be positive".into()));
        }
        Ok(())
    }

    pub fn panel_spec(&self) -> PanelSpec {
        let spec = self.panel.spec();
        match self.background {
            Some(rgb) => spec.with_background(rgb),
            None => spec,
        }
    }

    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.cadence_secs)
    }

    /// Form defaults and the options every slide is converted with.
    pub fn default_options(&self) -> ConvertOptions {
        ConvertOptions {
            threshold: self.threshold,
            threshold_offset: self.threshold_offset,
            saturation: self.saturation,
            ..ConvertOptions::default()
        }
    }
}
