use serde::{Deserialize, Serialize};
use std::fmt;

/// One point of a rolling graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplePoint {
    /// Horizontal coordinate in the visible window; `1.0` = newest edge.
    /// Drifts below zero as the point scrolls off-screen.
    pub position: f64,
    /// Normalized level in `[0, 100]`.
    pub level: f64,
}

impl SamplePoint {
    pub fn new(position: f64, level: f64) -> Self {
        Self { position, level }
    }
}

/// A single `{level, maximum}` pair for one entity at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Current usage, in the unit of `maximum` (percent or MiB).
    pub level: f64,
    /// Capacity the level is measured against.
    pub maximum: f64,
}

impl Reading {
    pub fn new(level: f64, maximum: f64) -> Self {
        Self { level, maximum }
    }

    /// A percentage reading (`maximum = 100`).
    pub fn percent(level: f64) -> Self {
        Self::new(level, 100.0)
    }

    /// `level` scaled to `[0, 100]`, or `None` when the capacity is unusable.
    #[must_use]
    pub fn normalized(&self) -> Option<f64> {
        if !self.level.is_finite() || !self.maximum.is_finite() || self.maximum <= 0.0 {
            return None;
        }
        Some((self.level * 100.0 / self.maximum).clamp(0.0, 100.0))
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::percent(0.0)
    }
}

/// Derived per-entity statistics, rebuilt every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UtilizationData {
    /// Device name as reported by the source.
    pub name: String,
    /// Raw level of the most recent reading (percent or MiB).
    pub current_level: f64,
    /// Capacity of the most recent reading.
    pub max_capacity: f64,
    /// Mean normalized level over the window.
    pub avg_level: f64,
    /// Lowest normalized level in the window.
    pub min_level: f64,
    /// Highest normalized level in the window.
    pub max_level: f64,
}

impl UtilizationData {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

impl Default for UtilizationData {
    fn default() -> Self {
        Self {
            name:          String::new(),
            current_level: 0.0,
            max_capacity:  100.0,
            avg_level:     0.0,
            min_level:     0.0,
            max_level:     0.0,
        }
    }
}

/// Framebuffer memory of one GPU, in MiB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryData {
    pub total: u64,
    pub free:  u64,
    pub used:  u64,
}

impl MemoryData {
    /// The reading fed to the window: `used` out of `total`.
    #[must_use]
    pub fn reading(&self) -> Reading {
        Reading::new(self.used as f64, self.total as f64)
    }
}

/// GPU context type of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessKind {
    Compute,
    Graphics,
    ComputeGraphics,
}

impl ProcessKind {
    /// Decode the `type` column of `nvidia-smi pmon` (`C`, `G`, `C+G`).
    ///
    /// Anything longer than one character carries both contexts.
    pub fn from_pmon(raw: &str) -> Self {
        match raw.trim() {
            "G" => Self::Graphics,
            s if s.chars().count() > 1 => Self::ComputeGraphics,
            _ => Self::Compute,
        }
    }
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compute         => "Compute",
            Self::Graphics        => "Graphics",
            Self::ComputeGraphics => "Compute + Graphics",
        })
    }
}

/// One row of the GPU process table.
///
/// Percentages are `None` when the source reports `-` (no sample).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub name:                String,
    pub kind:                ProcessKind,
    pub entity_index:        usize,
    pub pid:                 u32,
    pub compute_use_percent: Option<u32>,
    pub memory_use_percent:  Option<u32>,
    pub encoding_percent:    Option<u32>,
    pub decoding_percent:    Option<u32>,
    pub video_memory_mb:     Option<u64>,
    pub entity_name:         String,
}
