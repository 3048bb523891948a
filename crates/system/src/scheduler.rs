//! Fixed-cadence poll loop on a dedicated thread.

use nvsm_core::{NvsmError, Result, StreamKind};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Upper bound on streams one scheduler drives.
pub const MAX_STREAMS: usize = 3;

/// A stream the scheduler can poll.
///
/// `work` runs on the scheduler thread and may block on the sample source.
/// An error leaves the stream's previous state in place; the next cadence
/// simply tries again.
pub trait Worker: Send + Sync {
    fn kind(&self) -> StreamKind;

    fn work(&self) -> Result<()>;
}

/// Collects workers before the poll thread starts.
pub struct Scheduler {
    interval: Duration,
    workers:  Vec<Arc<dyn Worker>>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            workers: Vec::with_capacity(MAX_STREAMS),
        }
    }

    /// Add a stream.  Fails once [`MAX_STREAMS`] are registered.
    pub fn register(&mut self, worker: Arc<dyn Worker>) -> Result<()> {
        if self.workers.len() >= MAX_STREAMS {
            return Err(NvsmError::Scheduler(format!(
                "cannot register '{}': limit of {MAX_STREAMS} streams reached",
                worker.kind()
            )));
        }
        self.workers.push(worker);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Start the poll thread.  The returned handle stops and joins it.
    pub fn spawn(self) -> Result<SchedulerHandle> {
        let stop = Arc::new(StopSignal::default());
        let thread = thread::Builder::new()
            .name("nvsm-poller".into())
            .spawn({
                let stop = Arc::clone(&stop);
                move || run(self.workers, self.interval, &stop)
            })?;

        Ok(SchedulerHandle {
            stop,
            thread: Some(thread),
        })
    }
}

/// Owner side of a running scheduler.
///
/// [`SchedulerHandle::shutdown`] (or dropping the handle) returns only once
/// the poll thread has exited, so no `work` call can overlap whatever the
/// caller tears down afterwards.
pub struct SchedulerHandle {
    stop:   Arc<StopSignal>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Request a stop and block until the poll thread has finished.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn stop_and_join(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.stop.set();
        if thread.join().is_err() {
            error!("poll thread panicked");
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

/// Stop flag the poll thread sleeps on between ticks.
#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake:    Condvar,
}

impl StopSignal {
    fn is_set(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.wake.notify_all();
    }

    /// Sleep up to `timeout`; returns `true` if a stop was requested.
    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .wake
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }
}

fn run(workers: Vec<Arc<dyn Worker>>, interval: Duration, stop: &StopSignal) {
    info!(
        streams = workers.len(),
        interval_ms = interval.as_millis() as u64,
        "poll scheduler started"
    );

    while !stop.is_set() {
        let started = Instant::now();

        for worker in &workers {
            if let Err(e) = worker.work() {
                warn!(stream = %worker.kind(), "poll failed: {e}");
            }
        }

        // The cadence is the target period: time spent polling counts
        // against it.
        let remaining = interval.saturating_sub(started.elapsed());
        if stop.wait(remaining) {
            break;
        }
    }

    info!("poll scheduler stopped");
}
