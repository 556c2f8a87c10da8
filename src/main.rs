#![cfg_attr(not(feature = "web"), allow(dead_code, unused_imports))]

#[cfg(feature = "web")]
mod web;

use clap::Parser;
use std::path::PathBuf;

use paperpost::{Config, EpdDriver, PanelKind, PreviewDriver};

#[derive(Parser, Debug)]
#[command(name = "paperpost", about = "Upload, convert and queue images for an e-paper panel")]
struct Args {
    /// JSON config file; command line flags override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long, value_enum)]
    panel: Option<PanelKind>,

    /// Where uploads and camera captures wait for the worker
    #[arg(long, value_name = "DIR")]
    uploads: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    slideshow_dir: Option<PathBuf>,

    /// Seconds between slideshow advances
    #[arg(long, value_name = "SECS")]
    cadence: Option<u64>,

    /// Output directory for the preview panel
    #[arg(long, value_name = "DIR")]
    preview_dir: Option<PathBuf>,

    /// Skip the startup banner
    #[arg(long)]
    no_banner: bool,
}

impl Args {
    fn into_config(self) -> paperpost::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(panel) = self.panel {
            config.panel = panel;
        }
        if let Some(dir) = self.uploads {
            config.uploads_dir = dir;
        }
        if let Some(dir) = self.slideshow_dir {
            config.slideshow_dir = dir;
        }
        if let Some(secs) = self.cadence {
            config.cadence_secs = secs;
        }
        if let Some(dir) = self.preview_dir {
            config.preview_dir = dir;
        }
        if self.no_banner {
            config.banner = false;
        }
        config.validate()?;
        Ok(config)
    }
}

fn open_driver(config: &Config) -> paperpost::Result<Box<dyn EpdDriver>> {
    match config.panel {
        PanelKind::Preview | PanelKind::PreviewAcep => Ok(Box::new(PreviewDriver::new(
            config.panel_spec(),
            &config.preview_dir,
        )?)),
        #[cfg(target_os = "linux")]
        PanelKind::Epd4in2bV2 => {
            let driver = paperpost::Epd4in2bV2::new(paperpost::Epd4in2bV2Config {
                spi_path: config.spi_path.clone(),
                gpio_chip: config.gpio_chip.clone(),
                ..Default::default()
            })?;
            Ok(Box::new(driver))
        }
        #[cfg(target_os = "linux")]
        PanelKind::Impression57 | PanelKind::Impression4 => {
            let spec = config.panel.spec();
            let driver = paperpost::InkyUc8159::new(paperpost::InkyUc8159Config {
                width: spec.width,
                height: spec.height,
                spi_path: config.spi_path.clone(),
                gpio_chip: config.gpio_chip.clone(),
                ..Default::default()
            })?;
            Ok(Box::new(driver))
        }
        #[cfg(not(target_os = "linux"))]
        other => Err(paperpost::Error::Config(format!(
            "panel {other} needs Linux SPI/GPIO, use --panel preview"
        ))),
    }
}

#[cfg(feature = "web")]
fn run(args: Args) -> paperpost::Result<()> {
    let config = args.into_config()?;
    let driver = open_driver(&config)?;
    let service = paperpost::DisplayService::start(&config, driver)?;

    let served = web::run_server(&config, service.clone());
    service.shutdown();
    served
}

#[cfg(feature = "web")]
fn main() {
    web::init_tracing();
    let args = Args::parse();
    if let Err(err) = run(args) {
        tracing::error!(error = %err, "Exiting");
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

#[cfg(not(feature = "web"))]
fn main() {
    eprintln!("paperpost was built without the `web` feature; nothing to serve.");
    std::process::exit(1);
}
