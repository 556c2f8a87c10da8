pub mod adapter;
pub mod banner;
pub mod camera;
pub mod config;
pub mod convert;
pub mod displays;
pub mod error;
pub mod exif;
pub mod job;
pub mod panel;
pub mod queue;
pub mod service;
pub mod slideshow;
pub mod upload;
pub mod worker;

pub use adapter::PanelAdapter;
pub use camera::{Camera, CommandCamera, NoCamera};
pub use config::{Config, PanelKind};
pub use convert::{ConvertOptions, Frame, IndexedPlane, Plane, convert};
pub use displays::{DriverError, EpdDriver, PreviewDriver};
pub use error::{ConversionError, Error, Result};
pub use job::Job;
pub use panel::{ColorMode, PanelSpec, Rotation};
pub use queue::DisplayQueue;
pub use service::{DisplayService, ServiceStatus, UploadedFile};
pub use slideshow::SlideshowScheduler;
pub use worker::QueueWorker;

#[cfg(target_os = "linux")]
pub use displays::{Epd4in2bV2, Epd4in2bV2Config, InkyUc8159, InkyUc8159Config, Pins};
