use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::adapter::PanelAdapter;
use crate::convert::{convert_file, frame_from_prepared, load_image};
use crate::displays::EpdDriver;
use crate::error::{Error, Result};
use crate::job::Job;
use crate::panel::PanelSpec;
use crate::queue::DisplayQueue;

/// The only owner of the panel driver. Pulls jobs one at a time until the queue
/// closes or the hardware fails.
pub struct QueueWorker<D: EpdDriver> {
    queue: Arc<DisplayQueue>,
    adapter: PanelAdapter<D>,
}

impl<D: EpdDriver> QueueWorker<D> {
    pub fn new(queue: Arc<DisplayQueue>, driver: D) -> Self {
        Self {
            queue,
            adapter: PanelAdapter::new(driver),
        }
    }

    pub fn with_background(mut self, background: [u8; 3]) -> Self {
        self.adapter = self.adapter.with_background(background);
        self
    }

    pub fn panel(&self) -> &PanelSpec {
        self.adapter.panel()
    }

    /// Returns `Err` only for hardware faults, after the panel was told to sleep.
    pub fn run(mut self) -> Result<()> {
        info!(panel = %self.adapter.panel(), "Display worker started");

        while let Some(job) = self.queue.dequeue() {
            let kind = job.kind();
            let started = Instant::now();

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.execute(&job)))
                .unwrap_or_else(|payload| Err(Error::Panicked(panic_message(payload))));
            job.remove_temporary_files();

            match outcome {
                Ok(()) => {
                    info!(kind, elapsed_ms = started.elapsed().as_millis() as u64, "Job complete");
                }
                Err(e) if e.is_fatal() => {
                    error!(kind, error = %e, "Hardware failure, stopping display worker");
                    self.adapter.force_sleep();
                    for pending in self.queue.close() {
                        pending.remove_temporary_files();
                    }
                    self.queue.finish();
                    return Err(e);
                }
                Err(e) => {
                    warn!(kind, error = %e, "Job failed, dropping it");
                }
            }
            self.queue.finish();
        }

        info!("Display worker stopped");
        Ok(())
    }

    fn execute(&mut self, job: &Job) -> Result<()> {
        match job {
            Job::Clear => self.adapter.clear(),
            Job::Convert {
                source, options, ..
            } => {
                let frame = convert_file(source, options, self.adapter.panel())?;
                self.adapter.push(&frame)
            }
            Job::LoadPrepared { black, red } => {
                let black = black.as_deref().map(load_image).transpose()?;
                let red = red.as_deref().map(load_image).transpose()?;
                let frame = frame_from_prepared(black.as_ref(), red.as_ref(), self.adapter.panel())?;
                self.adapter.push(&frame)
            }
            Job::Raw { frame } => self.adapter.push(frame),
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
