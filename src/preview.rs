use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const DEFAULT_PREVIEW_DELAY: f32 = 0.18;

/// Decides when an auto-preview apply fires in response to navigation.
///
/// Polled with monotonic timestamps supplied by the caller, so the timing
/// logic is testable without an event loop. A new navigation event
/// unconditionally supersedes the pending settle timer; `tick` fires at most
/// once per settle period, and only for an index that has not been applied
/// yet.
pub struct PreviewDebouncer {
    enabled: bool,
    delay: Duration,
    pending: Option<(usize, Instant)>,
    last_applied: Option<usize>,
}

impl PreviewDebouncer {
    pub fn new(delay: Duration, enabled: bool) -> Self {
        Self {
            enabled,
            delay,
            pending: None,
            last_applied: None,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Records a navigation event and restarts the settle timer.
    pub fn on_navigate(&mut self, index: usize, now: Instant) {
        self.pending = Some((index, now));
    }

    /// Returns the index an apply should fire for, if the selection has been
    /// stationary for at least the settle delay.
    pub fn tick(&mut self, now: Instant) -> Option<usize> {
        if !self.enabled {
            return None;
        }
        let (index, since) = self.pending?;
        if now.duration_since(since) < self.delay {
            return None;
        }
        self.pending = None;
        if self.last_applied == Some(index) {
            return None;
        }
        Some(index)
    }

    pub fn mark_applied(&mut self, index: usize) {
        self.last_applied = Some(index);
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.last_applied = None;
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct Slot {
    pending: Option<Job>,
    running: bool,
    closed: bool,
}

/// Single worker thread with a one-deep, latest-wins job slot.
///
/// Backend apply calls can be slow (process spawn); submitting through this
/// runner keeps them off the frame loop, and a newer preview target simply
/// replaces a not-yet-started one instead of queueing behind it. A job that
/// already started always runs to completion.
pub struct PreviewRunner {
    shared: Arc<(Mutex<Slot>, Condvar)>,
    worker: Option<JoinHandle<()>>,
}

impl PreviewRunner {
    pub fn new() -> io::Result<Self> {
        let shared = Arc::new((Mutex::new(Slot::default()), Condvar::new()));
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("preview-runner".to_string())
            .spawn(move || run_worker(worker_shared))?;

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    pub fn submit<F: FnOnce() + Send + 'static>(&self, job: F) {
        let (lock, cvar) = &*self.shared;
        let mut slot = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.closed {
            return;
        }
        slot.pending = Some(Box::new(job));
        cvar.notify_all();
    }

    /// Drops a job that has not started yet.
    pub fn cancel_pending(&self) {
        let (lock, _) = &*self.shared;
        let mut slot = lock.lock().unwrap_or_else(PoisonError::into_inner);
        slot.pending = None;
    }

    /// Blocks until no job is pending or running.
    pub fn wait_idle(&self) {
        let (lock, cvar) = &*self.shared;
        let mut slot = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while slot.pending.is_some() || slot.running {
            slot = cvar.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn shutdown(&mut self, flush_pending: bool) {
        {
            let (lock, cvar) = &*self.shared;
            let mut slot = lock.lock().unwrap_or_else(PoisonError::into_inner);
            if flush_pending {
                while slot.pending.is_some() || slot.running {
                    slot = cvar.wait(slot).unwrap_or_else(PoisonError::into_inner);
                }
            }
            slot.closed = true;
            slot.pending = None;
            cvar.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for PreviewRunner {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shutdown(false);
        }
    }
}

fn run_worker(shared: Arc<(Mutex<Slot>, Condvar)>) {
    let (lock, cvar) = &*shared;
    loop {
        let job = {
            let mut slot = lock.lock().unwrap_or_else(PoisonError::into_inner);
            let job = loop {
                if let Some(job) = slot.pending.take() {
                    break job;
                }
                if slot.closed {
                    return;
                }
                slot = cvar.wait(slot).unwrap_or_else(PoisonError::into_inner);
            };
            slot.running = true;
            job
        };

        job();

        let mut slot = lock.lock().unwrap_or_else(PoisonError::into_inner);
        slot.running = false;
        cvar.notify_all();
    }
}
