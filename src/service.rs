use std::fs;
use std::path::PathBuf;
use std::process;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::banner::banner_job;
use crate::camera::{Camera, CommandCamera, NoCamera};
use crate::config::Config;
use crate::convert::ConvertOptions;
use crate::displays::EpdDriver;
use crate::error::{Error, Result};
use crate::job::Job;
use crate::panel::{ColorMode, PanelSpec};
use crate::queue::DisplayQueue;
use crate::slideshow::SlideshowScheduler;
use crate::upload::UploadStore;
use crate::worker::QueueWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub busy: bool,
    pub queued: usize,
    pub slideshow: bool,
    pub width: u16,
    pub height: u16,
    pub color_mode: ColorMode,
}

/// A file field from a form: the client's file name and its contents.
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Process-wide handle shared by every request handler. Owns the queue, the
/// slideshow and the worker thread; the driver itself lives in the worker.
pub struct DisplayService {
    panel: PanelSpec,
    queue: Arc<DisplayQueue>,
    slideshow: SlideshowScheduler,
    uploads: UploadStore,
    camera: Box<dyn Camera>,
    defaults: ConvertOptions,
    allowed_extensions: Vec<String>,
    prepared_extensions: Vec<String>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DisplayService {
    /// Builds the service without a worker. Jobs accumulate until one is attached.
    pub fn new(config: &Config, panel: PanelSpec, camera: Box<dyn Camera>) -> Result<Self> {
        Self::with_queue(config, panel, camera, Arc::new(DisplayQueue::new()))
    }

    fn with_queue(
        config: &Config,
        panel: PanelSpec,
        camera: Box<dyn Camera>,
        queue: Arc<DisplayQueue>,
    ) -> Result<Self> {
        let slideshow = SlideshowScheduler::new(
            queue.clone(),
            &config.slideshow_dir,
            config.allowed_extensions.clone(),
            config.cadence(),
        )
        .with_options(config.default_options());

        Ok(Self {
            panel,
            queue,
            slideshow,
            uploads: UploadStore::new(&config.uploads_dir)?,
            camera,
            defaults: config.default_options(),
            allowed_extensions: config.allowed_extensions.clone(),
            prepared_extensions: config.prepared_extensions.clone(),
            worker: Mutex::new(None),
        })
    }

    /// Moves `driver` into a dedicated worker thread and returns the running service.
    /// A hardware fault in the worker terminates the process.
    pub fn start<D>(config: &Config, driver: D) -> Result<Arc<Self>>
    where
        D: EpdDriver + 'static,
    {
        let camera: Box<dyn Camera> = match CommandCamera::from_command(&config.camera_command) {
            Some(camera) => Box::new(camera),
            None => Box::new(NoCamera),
        };
        let queue = Arc::new(DisplayQueue::new());
        let mut worker = QueueWorker::new(queue.clone(), driver);
        if let Some(background) = config.background {
            worker = worker.with_background(background);
        }
        let service = Arc::new(Self::with_queue(config, *worker.panel(), camera, queue)?);

        let handle = thread::Builder::new()
            .name("panel-worker".into())
            .spawn(move || {
                if let Err(e) = worker.run() {
                    error!(error = %e, "Display worker stopped on a fatal error, exiting");
                    process::exit(1);
                }
            })?;
        *service.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        if config.banner {
            service.enqueue(banner_job(&service.panel));
        }
        info!(panel = %service.panel, "Display service started");
        Ok(service)
    }

    pub fn panel(&self) -> &PanelSpec {
        &self.panel
    }

    /// Form defaults: configured thresholds and saturation, everything else off.
    pub fn default_options(&self) -> ConvertOptions {
        self.defaults
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    pub fn prepared_extensions(&self) -> &[String] {
        &self.prepared_extensions
    }

    pub fn slideshow(&self) -> &SlideshowScheduler {
        &self.slideshow
    }

    pub fn enqueue(&self, job: Job) -> usize {
        let kind = job.kind();
        let depth = self.queue.enqueue(job);
        debug!(kind, depth, "Job queued");
        depth
    }

    pub fn clear(&self) -> usize {
        self.enqueue(Job::Clear)
    }

    /// Stores an uploaded image and queues its conversion.
    pub fn submit_upload(&self, file: UploadedFile, options: ConvertOptions) -> Result<usize> {
        let source = self
            .uploads
            .store(&file.name, &file.bytes, &self.allowed_extensions)?;
        info!(name = %file.name, size = file.bytes.len(), "Upload accepted");
        Ok(self.enqueue(Job::Convert {
            source,
            options,
            temporary: true,
        }))
    }

    /// Queues already-split bitplanes. Invalid entries are skipped; at least one
    /// plane must survive validation.
    pub fn submit_prepared(
        &self,
        black: Option<UploadedFile>,
        red: Option<UploadedFile>,
    ) -> Result<usize> {
        let black = self.store_prepared("black", black);
        let red = self.store_prepared("red", red);
        if black.is_none() && red.is_none() {
            return Err(Error::Validation(format!(
                "no file selected or invalid file type (accepted: {})",
                self.prepared_extensions.join(", ")
            )));
        }
        let both = black.is_some() && red.is_some();
        let job = Job::LoadPrepared { black, red };
        if both && self.panel.color_mode == ColorMode::SevenColorPalette {
            job.remove_temporary_files();
            return Err(Error::Validation(
                "this panel takes a single prepared image; upload black or red, not both".into(),
            ));
        }
        Ok(self.enqueue(job))
    }

    fn store_prepared(&self, plane: &str, file: Option<UploadedFile>) -> Option<PathBuf> {
        let file = file?;
        match self
            .uploads
            .store(&file.name, &file.bytes, &self.prepared_extensions)
        {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(plane, error = %e, "Skipping prepared plane");
                None
            }
        }
    }

    /// Captures a still from the camera and queues its conversion.
    pub fn capture(&self, options: ConvertOptions) -> Result<usize> {
        let path = self
            .uploads
            .unique_path("capture", self.camera.extension());
        if let Err(e) = self.camera.capture_file(&path) {
            if let Err(rm) = fs::remove_file(&path) {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %rm, "Failed removing partial capture");
                }
            }
            return Err(e);
        }
        info!(path = %path.display(), "Camera capture queued");
        Ok(self.enqueue(Job::Convert {
            source: path,
            options,
            temporary: true,
        }))
    }

    pub fn set_slideshow(&self, enabled: bool) -> Result<bool> {
        self.slideshow.set_enabled(enabled)
    }

    pub fn toggle_slideshow(&self) -> Result<bool> {
        self.slideshow.toggle()
    }

    pub fn status(&self) -> ServiceStatus {
        ServiceStatus {
            busy: self.queue.is_busy(),
            queued: self.queue.len(),
            slideshow: self.slideshow.is_running(),
            width: self.panel.width,
            height: self.panel.height,
            color_mode: self.panel.color_mode,
        }
    }

    /// Stops the slideshow, discards pending jobs and waits for the current one
    /// to finish. Safe to call more than once.
    pub fn shutdown(&self) {
        self.slideshow.stop();
        let pending = self.queue.close();
        if !pending.is_empty() {
            info!(discarded = pending.len(), "Discarding pending jobs");
        }
        for job in pending {
            job.remove_temporary_files();
        }

        let handle = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Display worker panicked");
            }
        }
        info!("Display service stopped");
    }
}
