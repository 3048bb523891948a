use serde::{Deserialize, Serialize};
use std::fmt;

/// One independently polled subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Per-process GPU usage table (`nvidia-smi pmon`).
    Processes,
    /// Per-GPU compute utilization window.
    Utilization,
    /// Per-GPU memory utilization window.
    Memory,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Processes   => "processes",
            Self::Utilization => "utilization",
            Self::Memory      => "memory",
        })
    }
}

/// All messages that flow from the polling core to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A stream finished a full aggregation pass; its snapshot is consistent.
    DataUpdated(StreamKind),
}
