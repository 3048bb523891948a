//! nvsm: a headless NVIDIA GPU monitor.
//!
//! Polls `nvidia-smi` on a background thread and prints a summary of each
//! stream whenever it reports fresh data.
//!
//! Run with:  `RUST_LOG=info nvsm`

mod view;

use anyhow::Result;
use nvsm_core::{Message, StreamKind};
use nvsm_smi::{NvidiaSmi, SampleSource};
use nvsm_system::{Notifier, Scheduler, Streams, WindowConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Structured logging; RUST_LOG controls verbosity (default: info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("nvsm v{} starting", env!("CARGO_PKG_VERSION"));

    let config = nvsm_config::load(nvsm_config::default_path())?;
    info!(
        update_delay_ms = config.update_delay_ms,
        graph_length_ms = config.graph_length_ms,
        "configuration loaded"
    );

    let source: Arc<dyn SampleSource> = Arc::new(NvidiaSmi::new(config.smi_command.clone()));
    let window = WindowConfig::new(config.graph_length_ms, config.graph_step);
    let (notifier, mut rx) = Notifier::channel();
    let streams = Streams::new(source, window, &notifier);

    let mut scheduler = Scheduler::new(config.update_delay());
    streams.register(&mut scheduler)?;
    let handle = scheduler.spawn()?;

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(Message::DataUpdated(kind)) => render(&streams, kind),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received; shutting down");
                break;
            }
        }
    }

    // `shutdown` blocks until the poll thread has exited; keep that off the
    // async worker threads.
    tokio::task::spawn_blocking(move || handle.shutdown()).await?;
    info!("nvsm stopped");
    Ok(())
}

fn render(streams: &Streams, kind: StreamKind) {
    let lines = match kind {
        StreamKind::Processes   => view::process_lines(&streams.processes.snapshot()),
        StreamKind::Utilization => view::utilization_lines("GPU use", &streams.utilization.snapshot()),
        StreamKind::Memory      => view::memory_lines(&streams.memory.snapshot()),
    };
    for line in lines {
        println!("{line}");
    }
}
