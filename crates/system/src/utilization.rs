//! Rolling utilization windows for every GPU, fed by one [`ReadingSource`].

use crate::notify::Notifier;
use crate::readings::{EntityReading, ReadingSource};
use crate::scheduler::Worker;
use crate::window::{EntityWindow, WindowConfig};
use nvsm_core::{MemoryData, NvsmError, Result, SamplePoint, StreamKind, UtilizationData};
use nvsm_smi::SampleSource;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Copy of one entity's window, taken under the stream lock.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySnapshot {
    pub stats:  UtilizationData,
    pub points: Vec<SamplePoint>,
    pub memory: Option<MemoryData>,
}

#[derive(Debug, Default)]
struct UtilizationState {
    /// Time of the last completed tick; `None` until warm-up.
    last_tick: Option<Instant>,
    /// Latest reading per entity.  Entities the source stops reporting, or
    /// reports with an unusable row, keep their previous reading.
    readings:  Vec<EntityReading>,
    windows:   Vec<EntityWindow>,
}

/// One polled stream of per-GPU windows (compute or memory utilization).
pub struct UtilizationStream {
    reader:   Box<dyn ReadingSource>,
    source:   Arc<dyn SampleSource>,
    config:   WindowConfig,
    notifier: Notifier,
    state:    Mutex<UtilizationState>,
}

impl UtilizationStream {
    pub fn new(
        reader: impl ReadingSource + 'static,
        source: Arc<dyn SampleSource>,
        config: WindowConfig,
        notifier: Notifier,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            source,
            config,
            notifier,
            state: Mutex::new(UtilizationState::default()),
        }
    }

    /// Run one tick as if the clock read `now`.
    ///
    /// The very first tick only records `now` as the baseline, so the first
    /// visible point spans a real interval.  Later ticks receive fresh
    /// readings, scroll every window by the time since the last completed
    /// tick and notify the consumer.  On error nothing changes, including
    /// the baseline, and no notification is sent.
    pub fn tick_at(&self, now: Instant) -> Result<()> {
        let kind = self.reader.kind();
        let last = {
            let mut state = self.lock();
            match state.last_tick {
                Some(last) => last,
                None => {
                    state.last_tick = Some(now);
                    debug!(stream = %kind, "time baseline recorded");
                    return Ok(());
                }
            }
        };

        // The source call may block for a while; keep readers unblocked.
        let fresh = self.reader.receive_data(self.source.as_ref())?;
        if fresh.is_empty() {
            return Err(NvsmError::Parse(format!("{kind}: source reported no devices")));
        }

        let elapsed = now.saturating_duration_since(last);
        {
            let mut guard = self.lock();
            let state = &mut *guard;

            if state.windows.is_empty() {
                info!(stream = %kind, entities = fresh.len(), "entity set established");
                state.windows = fresh.iter().map(|r| EntityWindow::new(r.name.clone())).collect();
                state.readings = fresh;
            } else {
                if fresh.len() > state.readings.len() {
                    debug!(
                        stream = %kind,
                        known = state.readings.len(),
                        reported = fresh.len(),
                        "ignoring rows beyond the known entity set"
                    );
                }
                for (slot, entry) in state.readings.iter_mut().zip(fresh) {
                    if entry.reading.is_some() {
                        *slot = entry;
                    } else {
                        // Unparsable row: keep the last good reading.
                        slot.name = entry.name;
                    }
                }
            }

            for (window, slot) in state.windows.iter_mut().zip(&state.readings) {
                window.set_name(&slot.name);
                let Some(reading) = slot.reading else {
                    window.scroll(elapsed, &self.config);
                    continue;
                };
                if let Err(e) = window.advance(reading, elapsed, &self.config) {
                    warn!(stream = %kind, "no new point this tick: {e}");
                }
            }

            state.last_tick = Some(now);
        }

        self.notifier.data_updated(kind);
        Ok(())
    }

    /// Consistent copy of every entity's window and statistics.
    pub fn snapshot(&self) -> Vec<EntitySnapshot> {
        let state = self.lock();
        state
            .windows
            .iter()
            .zip(&state.readings)
            .map(|(window, slot)| EntitySnapshot {
                stats:  window.stats().clone(),
                points: window.points().iter().copied().collect(),
                memory: slot.memory,
            })
            .collect()
    }

    pub fn entity_count(&self) -> usize {
        self.lock().windows.len()
    }

    fn lock(&self) -> MutexGuard<'_, UtilizationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Worker for UtilizationStream {
    fn kind(&self) -> StreamKind {
        self.reader.kind()
    }

    fn work(&self) -> Result<()> {
        self.tick_at(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryUtilization;
    use crate::notify::Updates;
    use crate::readings::tests::{FakeSource, GatedSource};
    use crate::readings::GpuUtilization;
    use nvsm_core::Message;
    use nvsm_smi::Query;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    const EPS: f64 = 1e-9;

    fn stream(
        reader: impl ReadingSource + 'static,
        config: WindowConfig,
    ) -> (UtilizationStream, Arc<FakeSource>, Updates) {
        let source = Arc::new(FakeSource::default());
        let (notifier, rx) = Notifier::channel();
        let stream = UtilizationStream::new(reader, source.clone(), config, notifier);
        (stream, source, rx)
    }

    #[test]
    fn warm_up_tick_produces_nothing() {
        let (stream, _source, mut rx) = stream(GpuUtilization, WindowConfig::new(10_000, 1.0));

        // The fake has no answers yet; a source call here would fail.
        stream.tick_at(Instant::now()).unwrap();

        assert!(stream.snapshot().is_empty());
        assert_eq!(stream.entity_count(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn scenario_window_after_three_ticks() {
        let (stream, source, mut rx) = stream(GpuUtilization, WindowConfig::new(10_000, 2.0));
        source.set(Query::DeviceNames, "NVIDIA T400\n");
        let t0 = Instant::now();

        source.set(Query::GpuUtilization, "20\n");
        stream.tick_at(t0).unwrap();

        source.set(Query::GpuUtilization, "40\n");
        stream.tick_at(t0 + Duration::from_millis(2_000)).unwrap();
        let snapshot = stream.snapshot();
        assert_eq!(snapshot[0].points, vec![SamplePoint::new(1.0, 40.0)]);
        assert_eq!(rx.try_recv().unwrap(), Message::DataUpdated(StreamKind::Utilization));

        source.set(Query::GpuUtilization, "60\n");
        stream.tick_at(t0 + Duration::from_millis(4_000)).unwrap();
        let snapshot = stream.snapshot();
        let entity = &snapshot[0];
        assert_eq!(entity.points.len(), 2);
        assert!((entity.points[0].position - 0.6).abs() < EPS);
        assert_eq!(entity.points[1], SamplePoint::new(1.0, 60.0));
        assert_eq!(entity.stats.name, "NVIDIA T400");
        assert_eq!(entity.stats.min_level, 40.0);
        assert_eq!(entity.stats.max_level, 60.0);
        assert!((entity.stats.avg_level - 50.0).abs() < EPS);
        assert_eq!(entity.stats.current_level, 60.0);

        assert_eq!(rx.try_recv().unwrap(), Message::DataUpdated(StreamKind::Utilization));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn failed_poll_keeps_state_and_baseline() {
        let (stream, source, mut rx) = stream(GpuUtilization, WindowConfig::new(10_000, 1.0));
        source.set(Query::DeviceNames, "GPU A\n");
        source.set(Query::GpuUtilization, "50\n");
        let t0 = Instant::now();

        stream.tick_at(t0).unwrap();
        stream.tick_at(t0 + Duration::from_millis(1_000)).unwrap();
        let before = stream.snapshot();
        let _ = rx.try_recv();

        source.clear(Query::GpuUtilization);
        assert!(stream.tick_at(t0 + Duration::from_millis(2_000)).is_err());
        assert_eq!(stream.snapshot(), before);
        assert!(rx.try_recv().is_err());

        // The retry scrolls by the full 2 s since the last completed tick.
        source.set(Query::GpuUtilization, "70\n");
        stream.tick_at(t0 + Duration::from_millis(3_000)).unwrap();
        let points = &stream.snapshot()[0].points;
        assert!((points[0].position - 0.8).abs() < EPS);
        assert_eq!(points[1], SamplePoint::new(1.0, 70.0));
    }

    #[test]
    fn fewer_rows_leave_missing_entities_stale() {
        let (stream, source, _rx) = stream(GpuUtilization, WindowConfig::new(10_000, 1.0));
        source.set(Query::DeviceNames, "GPU A\nGPU B\n");
        source.set(Query::GpuUtilization, "10\n80\n");
        let t0 = Instant::now();

        stream.tick_at(t0).unwrap();
        stream.tick_at(t0 + Duration::from_millis(1_000)).unwrap();

        source.set(Query::GpuUtilization, "30\n");
        stream.tick_at(t0 + Duration::from_millis(2_000)).unwrap();

        let snapshot = stream.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].stats.current_level, 30.0);
        assert_eq!(snapshot[1].stats.current_level, 80.0);
        assert_eq!(snapshot[1].points.len(), 2);
    }

    #[test]
    fn entity_set_is_fixed_at_first_poll() {
        let (stream, source, _rx) = stream(GpuUtilization, WindowConfig::new(10_000, 1.0));
        source.set(Query::DeviceNames, "GPU A\n");
        source.set(Query::GpuUtilization, "10\n");
        let t0 = Instant::now();

        stream.tick_at(t0).unwrap();
        stream.tick_at(t0 + Duration::from_millis(1_000)).unwrap();

        source.set(Query::GpuUtilization, "20\n90\n");
        stream.tick_at(t0 + Duration::from_millis(2_000)).unwrap();
        assert_eq!(stream.entity_count(), 1);
        assert_eq!(stream.snapshot()[0].stats.current_level, 20.0);
    }

    #[test]
    fn zero_capacity_entity_is_skipped_but_others_advance() {
        let (stream, source, _rx) = stream(MemoryUtilization, WindowConfig::new(10_000, 1.0));
        source.set(Query::DeviceNames, "GPU A\nGPU B\n");
        source.set(Query::MemoryUtilization, "0, 0, 0\n8192, 4096, 4096\n");
        let t0 = Instant::now();

        stream.tick_at(t0).unwrap();
        stream.tick_at(t0 + Duration::from_millis(1_000)).unwrap();

        let snapshot = stream.snapshot();
        assert!(snapshot[0].points.is_empty());
        assert_eq!(snapshot[0].stats.avg_level, 0.0);
        assert_eq!(snapshot[1].points, vec![SamplePoint::new(1.0, 50.0)]);
        assert_eq!(snapshot[1].memory.map(|m| m.free), Some(4096));
    }

    #[test]
    fn zero_capacity_tick_keeps_time_aligned_across_entities() {
        let (stream, source, _rx) = stream(MemoryUtilization, WindowConfig::new(10_000, 1.0));
        source.set(Query::DeviceNames, "GPU A\nGPU B\n");
        source.set(Query::MemoryUtilization, "8192, 4096, 4096\n8192, 6144, 2048\n");
        let t0 = Instant::now();

        stream.tick_at(t0).unwrap();
        stream.tick_at(t0 + Duration::from_millis(1_000)).unwrap();

        source.set(Query::MemoryUtilization, "0, 0, 0\n8192, 6144, 2048\n");
        stream.tick_at(t0 + Duration::from_millis(2_000)).unwrap();

        source.set(Query::MemoryUtilization, "8192, 2048, 6144\n8192, 6144, 2048\n");
        stream.tick_at(t0 + Duration::from_millis(3_000)).unwrap();

        let snapshot = stream.snapshot();
        assert_eq!(snapshot[0].points.len(), 2);
        assert_eq!(snapshot[1].points.len(), 3);
        assert!((snapshot[0].points[0].position - 0.8).abs() < EPS);
        assert!((snapshot[1].points[0].position - 0.8).abs() < EPS);
        assert_eq!(snapshot[0].points[1], SamplePoint::new(1.0, 75.0));
        assert_eq!(snapshot[0].stats.current_level, 6144.0);
    }

    #[test]
    fn unparsable_row_keeps_last_good_reading() {
        let (stream, source, mut rx) = stream(GpuUtilization, WindowConfig::new(10_000, 1.0));
        source.set(Query::DeviceNames, "GPU A\nGPU B\n");
        source.set(Query::GpuUtilization, "10\n80\n");
        let t0 = Instant::now();

        stream.tick_at(t0).unwrap();
        stream.tick_at(t0 + Duration::from_millis(1_000)).unwrap();
        let _ = rx.try_recv();

        source.set(Query::GpuUtilization, "40\n[N/A]\n");
        stream.tick_at(t0 + Duration::from_millis(2_000)).unwrap();

        let snapshot = stream.snapshot();
        assert_eq!(snapshot[0].stats.current_level, 40.0);
        assert_eq!(snapshot[1].stats.current_level, 80.0);
        assert_eq!(snapshot[1].points.len(), 2);
        assert!((snapshot[1].points[0].position - 0.9).abs() < EPS);
        assert_eq!(rx.try_recv().unwrap(), Message::DataUpdated(StreamKind::Utilization));
    }

    #[test]
    fn entity_without_any_good_reading_only_scrolls() {
        let (stream, source, _rx) = stream(GpuUtilization, WindowConfig::new(10_000, 1.0));
        source.set(Query::DeviceNames, "GPU A\nGPU B\n");
        source.set(Query::GpuUtilization, "[N/A]\n20\n");
        let t0 = Instant::now();

        stream.tick_at(t0).unwrap();
        stream.tick_at(t0 + Duration::from_millis(1_000)).unwrap();
        source.set(Query::GpuUtilization, "[N/A]\n30\n");
        stream.tick_at(t0 + Duration::from_millis(2_000)).unwrap();

        let snapshot = stream.snapshot();
        assert_eq!(snapshot[0].stats.name, "GPU A");
        assert!(snapshot[0].points.is_empty());
        assert_eq!(snapshot[1].points.len(), 2);
    }

    #[test]
    fn readers_are_served_while_the_source_call_runs() {
        let (source, entered, release) = GatedSource::new(Query::GpuUtilization);
        source.inner.set(Query::DeviceNames, "GPU A\n");
        source.inner.set(Query::GpuUtilization, "10\n");
        let (notifier, _rx) = Notifier::channel();
        let stream = Arc::new(UtilizationStream::new(
            GpuUtilization,
            source.clone(),
            WindowConfig::new(10_000, 1.0),
            notifier,
        ));
        let t0 = Instant::now();
        stream.tick_at(t0).unwrap();
        stream.tick_at(t0 + Duration::from_millis(1_000)).unwrap();

        source.arm();
        let poller = {
            let stream = stream.clone();
            thread::spawn(move || stream.tick_at(t0 + Duration::from_millis(2_000)))
        };
        entered.recv_timeout(Duration::from_secs(5)).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        {
            let stream = stream.clone();
            thread::spawn(move || {
                let _ = done_tx.send((stream.snapshot(), stream.entity_count()));
            });
        }
        let (snapshot, count) = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("reader blocked behind the source call");
        assert_eq!(count, 1);
        assert_eq!(snapshot[0].stats.current_level, 10.0);

        release.send(()).unwrap();
        poller.join().unwrap().unwrap();
        assert_eq!(stream.snapshot()[0].points.len(), 2);
    }

    #[test]
    fn worker_reports_reader_kind() {
        let (stream, _source, _rx) = stream(MemoryUtilization, WindowConfig::new(10_000, 1.0));
        assert_eq!(Worker::kind(&stream), StreamKind::Memory);
    }
}
