//! GPU process table: rebuilt wholesale every poll, keyed by pid.

use crate::notify::Notifier;
use crate::readings::device_name;
use crate::scheduler::Worker;
use chrono::{DateTime, Local};
use nvsm_core::{NvsmError, ProcessEntry, ProcessKind, Result, StreamKind};
use nvsm_smi::{parse_value, Query, Row, SampleSource};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tracing::{debug, info};

// pmon column layout: gpu pid type fb sm mem enc dec command
const COL_GPU:  usize = 0;
const COL_PID:  usize = 1;
const COL_TYPE: usize = 2;
const COL_FB:   usize = 3;
const COL_SM:   usize = 4;
const COL_MEM:  usize = 5;
const COL_ENC:  usize = 6;
const COL_DEC:  usize = 7;
const COL_NAME: usize = 8;

/// The latest process snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessTable {
    pub entries:      Vec<ProcessEntry>,
    /// When the snapshot was taken; `None` before the first poll.
    pub refreshed_at: Option<DateTime<Local>>,
}

impl ProcessTable {
    /// Row index of the first entry with `pid`.
    pub fn index_of(&self, pid: u32) -> Option<usize> {
        self.entries.iter().position(|e| e.pid == pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build process entries from pmon rows.
///
/// Rows without a numeric GPU index or pid are skipped: pmon prints a
/// `-` placeholder row for every idle GPU.
pub fn parse_processes(rows: &[Row], names: &[Row]) -> Vec<ProcessEntry> {
    rows.iter()
        .filter_map(|row| {
            if row.len() <= COL_NAME {
                debug!(?row, "short pmon row skipped");
                return None;
            }
            let entity_index = row[COL_GPU].parse::<usize>().ok()?;
            let pid = row[COL_PID].parse::<u32>().ok()?;
            let percent = |col: usize| parse_value(&row[col]).and_then(|v| u32::try_from(v).ok());

            Some(ProcessEntry {
                name:                row[COL_NAME..].join(" "),
                kind:                ProcessKind::from_pmon(&row[COL_TYPE]),
                entity_index,
                pid,
                compute_use_percent: percent(COL_SM),
                memory_use_percent:  percent(COL_MEM),
                encoding_percent:    percent(COL_ENC),
                decoding_percent:    percent(COL_DEC),
                video_memory_mb:     parse_value(&row[COL_FB]),
                entity_name:         device_name(names, entity_index),
            })
        })
        .collect()
}

/// The consumer's selected process, remembered by pid across rebuilds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    pid: Option<u32>,
}

impl Selection {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn select(&mut self, pid: u32) {
        self.pid = Some(pid);
    }

    /// Select the process shown at `row`; a click outside the table clears.
    pub fn select_row(&mut self, table: &ProcessTable, row: usize) {
        self.pid = table.entries.get(row).map(|e| e.pid);
    }

    pub fn clear(&mut self) {
        self.pid = None;
    }

    /// Row the selection lands on in a freshly rebuilt table.
    ///
    /// The pid is kept even when absent, so the process is re-selected if it
    /// shows up again.
    pub fn reapply(&self, table: &ProcessTable) -> Option<usize> {
        self.pid.and_then(|pid| table.index_of(pid))
    }
}

/// External primitive that asks a process to terminate.
pub trait ProcessKiller: Send + Sync {
    fn kill(&self, pid: u32) -> Result<()>;
}

/// Sends `SIGTERM` (or the platform's closest equivalent) through `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoKiller;

impl ProcessKiller for SysinfoKiller {
    fn kill(&self, pid: u32) -> Result<()> {
        let pid = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        let process = system
            .process(pid)
            .ok_or_else(|| NvsmError::Process(format!("process {pid} not found")))?;

        let sent = process.kill_with(Signal::Term).unwrap_or_else(|| process.kill());
        if sent {
            Ok(())
        } else {
            Err(NvsmError::Process(format!("failed to signal process {pid}")))
        }
    }
}

/// Polled stream owning the process table.
pub struct ProcessesStream {
    source:   Arc<dyn SampleSource>,
    notifier: Notifier,
    table:    Mutex<ProcessTable>,
}

impl ProcessesStream {
    pub fn new(source: Arc<dyn SampleSource>, notifier: Notifier) -> Self {
        Self {
            source,
            notifier,
            table: Mutex::new(ProcessTable::default()),
        }
    }

    /// Query the source and replace the table.  On error the previous
    /// snapshot stays in place and no notification is sent.
    pub fn refresh(&self) -> Result<()> {
        let rows    = self.source.invoke(Query::Processes)?;
        let names   = self.source.invoke(Query::DeviceNames)?;
        let entries = parse_processes(&rows, &names);
        debug!(processes = entries.len(), "process table rebuilt");

        {
            let mut table = self.lock();
            table.entries      = entries;
            table.refreshed_at = Some(Local::now());
        }

        self.notifier.data_updated(StreamKind::Processes);
        Ok(())
    }

    /// Consistent copy of the current table.
    pub fn snapshot(&self) -> ProcessTable {
        self.lock().clone()
    }

    pub fn index_of(&self, pid: u32) -> Option<usize> {
        self.lock().index_of(pid)
    }

    /// Terminate `pid` if it is still in the latest snapshot.
    ///
    /// Returns `Ok(false)` without touching the process when it is no longer
    /// listed.  The table lock is released before the killer runs.
    pub fn kill(&self, pid: u32, killer: &dyn ProcessKiller) -> Result<bool> {
        if self.index_of(pid).is_none() {
            debug!(pid, "kill skipped: process no longer listed");
            return Ok(false);
        }
        killer.kill(pid)?;
        info!(pid, "terminate request sent");
        Ok(true)
    }

    /// Kill the selected process and clear the selection once signalled.
    pub fn kill_selected(&self, selection: &mut Selection, killer: &dyn ProcessKiller) -> Result<bool> {
        let Some(pid) = selection.pid() else {
            return Ok(false);
        };
        let killed = self.kill(pid, killer)?;
        if killed {
            selection.clear();
        }
        Ok(killed)
    }

    fn lock(&self) -> MutexGuard<'_, ProcessTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Worker for ProcessesStream {
    fn kind(&self) -> StreamKind {
        StreamKind::Processes
    }

    fn work(&self) -> Result<()> {
        self.refresh()
    }
}
