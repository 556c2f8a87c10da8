use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::warn;

use crate::job::Job;

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    active: bool,
    closed: bool,
}

impl QueueState {
    fn idle(&self) -> bool {
        self.jobs.is_empty() && !self.active
    }
}

/// Unbounded FIFO between many producers and the single panel worker.
///
/// Besides the jobs themselves the queue tracks whether the worker is busy, so
/// producers can block until everything queued so far has reached the glass.
#[derive(Default)]
pub struct DisplayQueue {
    state: Mutex<QueueState>,
    job_ready: Condvar,
    idle: Condvar,
}

impl DisplayQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking producer must not wedge the panel, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `job` and returns the queue depth. Never waits on the panel.
    pub fn enqueue(&self, job: Job) -> usize {
        let mut state = self.lock();
        if state.closed {
            warn!(kind = job.kind(), "Queue closed, dropping job");
            drop(state);
            job.remove_temporary_files();
            return 0;
        }
        state.jobs.push_back(job);
        let depth = state.jobs.len();
        drop(state);
        self.job_ready.notify_one();
        depth
    }

    /// Blocks until a job is available and marks the worker active.
    /// Returns `None` once the queue has been closed.
    pub fn dequeue(&self) -> Option<Job> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(job) = state.jobs.pop_front() {
                state.active = true;
                return Some(job);
            }
            state = self
                .job_ready
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Called by the worker after each job, successful or not.
    pub fn finish(&self) {
        let mut state = self.lock();
        state.active = false;
        let idle = state.idle();
        drop(state);
        if idle {
            self.idle.notify_all();
        }
    }

    /// Waits until the queue is drained and the worker is idle, or `timeout` passes.
    /// Returns whether idle was reached.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let state = self.lock();
        let (state, _) = self
            .idle
            .wait_timeout_while(state, timeout, |s| !s.idle() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        state.idle()
    }

    /// Stops the worker and hands back anything still pending.
    pub fn close(&self) -> Vec<Job> {
        let mut state = self.lock();
        state.closed = true;
        let pending = state.jobs.drain(..).collect();
        drop(state);
        self.job_ready.notify_all();
        self.idle.notify_all();
        pending
    }

    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().jobs.is_empty()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().active
    }

    pub fn is_idle(&self) -> bool {
        self.lock().idle()
    }
}
