use std::path::PathBuf;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::convert::ConvertOptions;
use crate::error::{Error, Result};
use crate::job::Job;
use crate::queue::DisplayQueue;
use crate::upload::{ensure_dir, list_images};

// How often the idle wait re-checks the enabled flag.
const IDLE_POLL: Duration = Duration::from_millis(250);

#[derive(Default)]
struct SlideshowState {
    enabled: bool,
    // Bumped on every start so a stale producer thread retires.
    generation: u64,
    images: Vec<PathBuf>,
}

struct Shared {
    state: Mutex<SlideshowState>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SlideshowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn running(&self, generation: u64) -> bool {
        let state = self.lock();
        state.enabled && state.generation == generation
    }

    /// Sleeps for `duration` unless stopped first. Returns whether still running.
    fn sleep_while_running(&self, generation: u64, duration: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .wake
            .wait_timeout_while(state, duration, |s| s.enabled && s.generation == generation)
            .unwrap_or_else(PoisonError::into_inner);
        state.enabled && state.generation == generation
    }
}

/// Second producer for the display queue: cycles through a directory of
/// images, one slide per cadence, until stopped.
pub struct SlideshowScheduler {
    queue: Arc<DisplayQueue>,
    dir: PathBuf,
    allowed: Vec<String>,
    cadence: Duration,
    options: ConvertOptions,
    shared: Arc<Shared>,
}

impl SlideshowScheduler {
    pub fn new(
        queue: Arc<DisplayQueue>,
        dir: impl Into<PathBuf>,
        allowed: Vec<String>,
        cadence: Duration,
    ) -> Self {
        Self {
            queue,
            dir: dir.into(),
            allowed,
            cadence,
            options: ConvertOptions::default(),
            shared: Arc::new(Shared {
                state: Mutex::new(SlideshowState::default()),
                wake: Condvar::new(),
            }),
        }
    }

    /// Options for every slide. Monochrome is always forced off.
    pub fn with_options(mut self, options: ConvertOptions) -> Self {
        self.options = ConvertOptions {
            monochrome: false,
            ..options
        };
        self
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().enabled
    }

    pub fn image_count(&self) -> usize {
        self.shared.lock().images.len()
    }

    pub fn cadence(&self) -> Duration {
        self.cadence
    }

    /// Snapshot and shuffle the directory, then start producing. A second call
    /// while running is a no-op.
    pub fn start(&self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        ensure_dir(&self.dir)?;
        let mut images = list_images(&self.dir, &self.allowed)?;
        images.shuffle(&mut rand::rng());

        let generation = {
            let mut state = self.shared.lock();
            state.enabled = true;
            state.generation += 1;
            state.images = images.clone();
            state.generation
        };
        info!(
            dir = %self.dir.display(),
            images = images.len(),
            cadence_s = self.cadence.as_secs(),
            "Slideshow started"
        );

        let producer = Producer {
            queue: self.queue.clone(),
            shared: self.shared.clone(),
            images,
            cadence: self.cadence,
            options: self.options,
            generation,
        };
        thread::Builder::new()
            .name("slideshow".into())
            .spawn(move || producer.run())
            .map_err(Error::Io)?;
        Ok(())
    }

    pub fn stop(&self) {
        let mut state = self.shared.lock();
        if !state.enabled {
            return;
        }
        state.enabled = false;
        drop(state);
        self.shared.wake.notify_all();
        info!("Slideshow stopped");
    }

    /// Flip between running and stopped; returns the new state.
    pub fn toggle(&self) -> Result<bool> {
        self.set_enabled(!self.is_running())
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<bool> {
        if enabled {
            self.start()?;
        } else {
            self.stop();
        }
        Ok(self.is_running())
    }
}

struct Producer {
    queue: Arc<DisplayQueue>,
    shared: Arc<Shared>,
    images: Vec<PathBuf>,
    cadence: Duration,
    options: ConvertOptions,
    generation: u64,
}

impl Producer {
    fn run(self) {
        if self.images.is_empty() {
            warn!("Slideshow directory has no images, idling until stopped");
            while self.sleep(self.cadence) {}
            return;
        }

        let mut index = 0;
        loop {
            if !self.running() {
                break;
            }
            let slide = &self.images[index];
            debug!(slide = %slide.display(), index, "Queueing slide");
            self.queue.enqueue(Job::Convert {
                source: slide.clone(),
                options: self.options,
                temporary: false,
            });

            if !self.wait_for_display() || !self.sleep(self.cadence) {
                break;
            }
            index = (index + 1) % self.images.len();
        }
        debug!(generation = self.generation, "Slideshow producer exiting");
    }

    fn running(&self) -> bool {
        self.shared.running(self.generation)
    }

    fn sleep(&self, duration: Duration) -> bool {
        self.shared.sleep_while_running(self.generation, duration)
    }

    // The idle condvar belongs to the queue, so the enabled flag is
    // re-checked between bounded waits.
    fn wait_for_display(&self) -> bool {
        loop {
            if !self.running() {
                return false;
            }
            if self.queue.wait_idle_timeout(IDLE_POLL) {
                return self.running();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use std::time::Instant;

    fn allowed() -> Vec<String> {
        vec!["png".to_string()]
    }

    fn slides(dir: &std::path::Path, n: usize) {
        for i in 0..n {
            GrayImage::from_pixel(4, 4, Luma([i as u8 * 40]))
                .save(dir.join(format!("slide-{i}.png")))
                .unwrap();
        }
    }

    // Plays the worker: takes jobs off the queue and finishes them at once.
    fn drain(queue: &DisplayQueue, seen: &mut Vec<PathBuf>, for_at_most: Duration) {
        let deadline = Instant::now() + for_at_most;
        while Instant::now() < deadline {
            if queue.is_empty() {
                thread::sleep(Duration::from_millis(5));
                continue;
            }
            if let Some(Job::Convert {
                source, temporary, ..
            }) = queue.dequeue()
            {
                assert!(!temporary);
                seen.push(source);
            }
            queue.finish();
        }
    }

    #[test]
    fn cycles_through_every_image() {
        let dir = tempfile::tempdir().unwrap();
        slides(dir.path(), 3);
        let queue = Arc::new(DisplayQueue::new());
        let show =
            SlideshowScheduler::new(queue.clone(), dir.path(), allowed(), Duration::from_millis(20));

        show.start().unwrap();
        assert!(show.is_running());
        assert_eq!(show.image_count(), 3);

        let mut seen = Vec::new();
        drain(&queue, &mut seen, Duration::from_millis(400));
        show.stop();

        assert!(seen.len() >= 4, "only {} slides shown", seen.len());
        let mut first_cycle = seen[..3].to_vec();
        first_cycle.sort();
        first_cycle.dedup();
        assert_eq!(first_cycle.len(), 3);
        assert_eq!(seen[3], seen[0]);
    }

    #[test]
    fn stop_halts_enqueueing_mid_cycle() {
        let dir = tempfile::tempdir().unwrap();
        slides(dir.path(), 2);
        let queue = Arc::new(DisplayQueue::new());
        let show =
            SlideshowScheduler::new(queue.clone(), dir.path(), allowed(), Duration::from_secs(3600));

        show.start().unwrap();
        let mut seen = Vec::new();
        drain(&queue, &mut seen, Duration::from_millis(100));
        assert_eq!(seen.len(), 1);

        // Stopping during the cadence sleep wakes the producer without another slide.
        show.stop();
        assert!(!show.is_running());
        drain(&queue, &mut seen, Duration::from_millis(300));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn stop_while_waiting_for_idle_skips_next_slide() {
        let dir = tempfile::tempdir().unwrap();
        slides(dir.path(), 2);
        let queue = Arc::new(DisplayQueue::new());
        let show =
            SlideshowScheduler::new(queue.clone(), dir.path(), allowed(), Duration::from_millis(1));

        show.start().unwrap();
        thread::sleep(Duration::from_millis(50));
        // Nobody drained the first slide, so the producer is still waiting for idle.
        assert_eq!(queue.len(), 1);
        show.stop();

        let _first = queue.dequeue().unwrap();
        queue.finish();
        thread::sleep(Duration::from_millis(2 * IDLE_POLL.as_millis() as u64));
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_directory_runs_without_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(DisplayQueue::new());
        let show =
            SlideshowScheduler::new(queue.clone(), dir.path(), allowed(), Duration::from_millis(10));

        show.start().unwrap();
        thread::sleep(Duration::from_millis(60));
        assert!(show.is_running());
        assert!(queue.is_empty());
        assert!(!show.toggle().unwrap());
    }

    #[test]
    fn restart_retires_previous_producer() {
        let dir = tempfile::tempdir().unwrap();
        slides(dir.path(), 1);
        let queue = Arc::new(DisplayQueue::new());
        let show =
            SlideshowScheduler::new(queue.clone(), dir.path(), allowed(), Duration::from_secs(3600));

        show.start().unwrap();
        show.stop();
        show.start().unwrap();

        let mut seen = Vec::new();
        drain(&queue, &mut seen, Duration::from_millis(150));
        show.stop();
        // At most one slide per generation, never two producers in the new one.
        assert!(seen.len() <= 2);
        assert!(!seen.is_empty());
    }

    #[test]
    fn slides_never_use_monochrome() {
        let queue = Arc::new(DisplayQueue::new());
        let show = SlideshowScheduler::new(queue, "unused", allowed(), Duration::from_secs(1))
            .with_options(ConvertOptions {
                monochrome: true,
                ..ConvertOptions::default()
            });
        assert!(!show.options.monochrome);
    }
}
