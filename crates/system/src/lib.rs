//! Sampling and aggregation core.
//!
//! Three streams (processes, GPU utilization, GPU memory) are polled by a
//! [`Scheduler`] on a background thread.  Each stream owns its state behind
//! a mutex and emits `Message::DataUpdated` after every completed pass.

pub mod memory;
pub mod notify;
pub mod processes;
pub mod readings;
pub mod scheduler;
pub mod utilization;
pub mod window;

pub use memory::{format_mib, MemoryUtilization};
pub use notify::{Notifier, Updates};
pub use processes::{
    parse_processes, ProcessKiller, ProcessTable, ProcessesStream, Selection, SysinfoKiller,
};
pub use readings::{EntityReading, GpuUtilization, ReadingSource};
pub use scheduler::{Scheduler, SchedulerHandle, Worker, MAX_STREAMS};
pub use utilization::{EntitySnapshot, UtilizationStream};
pub use window::{EntityWindow, WindowConfig};

use nvsm_smi::SampleSource;
use std::sync::Arc;

/// The three streams the monitor runs, sharing one source and notifier.
pub struct Streams {
    pub processes:   Arc<ProcessesStream>,
    pub utilization: Arc<UtilizationStream>,
    pub memory:      Arc<UtilizationStream>,
}

impl Streams {
    pub fn new(source: Arc<dyn SampleSource>, window: WindowConfig, notifier: &Notifier) -> Self {
        Self {
            processes:   Arc::new(ProcessesStream::new(source.clone(), notifier.clone())),
            utilization: Arc::new(UtilizationStream::new(
                GpuUtilization,
                source.clone(),
                window,
                notifier.clone(),
            )),
            memory:      Arc::new(UtilizationStream::new(
                MemoryUtilization,
                source,
                window,
                notifier.clone(),
            )),
        }
    }

    /// Register all three streams on `scheduler`.
    pub fn register(&self, scheduler: &mut Scheduler) -> nvsm_core::Result<()> {
        scheduler.register(self.processes.clone())?;
        scheduler.register(self.utilization.clone())?;
        scheduler.register(self.memory.clone())?;
        Ok(())
    }
}
