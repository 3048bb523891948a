//! Sliding window of normalized samples for one entity.

use nvsm_core::{NvsmError, Reading, Result, SamplePoint, UtilizationData};
use std::collections::VecDeque;
use std::time::Duration;

/// Geometry of the scrolling window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowConfig {
    /// Wall-clock time one `step_units` scroll corresponds to, in ms.
    pub duration_ms: f64,
    /// Normalized distance scrolled per `duration_ms`.
    pub step_units:  f64,
}

impl WindowConfig {
    pub fn new(duration_ms: u64, step_units: f64) -> Self {
        Self {
            duration_ms: duration_ms as f64,
            step_units,
        }
    }

    /// Leftward shift applied to existing points after `elapsed`.
    #[must_use]
    pub fn shift_for(&self, elapsed: Duration) -> f64 {
        elapsed.as_secs_f64() * 1000.0 / self.duration_ms * self.step_units
    }
}

/// Rolling history plus derived statistics for one entity.
#[derive(Debug, Clone, Default)]
pub struct EntityWindow {
    points: VecDeque<SamplePoint>,
    stats:  UtilizationData,
}

impl EntityWindow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            points: VecDeque::new(),
            stats:  UtilizationData::new(name),
        }
    }

    /// Points in insertion order, oldest first.
    pub fn points(&self) -> &VecDeque<SamplePoint> {
        &self.points
    }

    pub fn stats(&self) -> &UtilizationData {
        &self.stats
    }

    pub fn set_name(&mut self, name: &str) {
        if self.stats.name != name {
            self.stats.name = name.to_string();
        }
    }

    /// Scroll every point left by the screen fraction `elapsed` covers and
    /// drop the points that left the screen.
    pub fn scroll(&mut self, elapsed: Duration, config: &WindowConfig) {
        let shift = config.shift_for(elapsed);
        for point in &mut self.points {
            point.position -= shift;
        }
        evict_offscreen(&mut self.points);
        self.recompute();
    }

    /// Scroll the window by `elapsed`, append `reading` at the right edge,
    /// evict points that left the screen and recompute min/avg/max.
    ///
    /// A reading whose capacity is not positive is rejected after the
    /// scroll: the time still passes, but nothing is appended and the
    /// current level is kept.
    pub fn advance(
        &mut self,
        reading: Reading,
        elapsed: Duration,
        config: &WindowConfig,
    ) -> Result<()> {
        self.scroll(elapsed, config);
        let level = reading.normalized().ok_or_else(|| {
            NvsmError::InvalidReading(format!(
                "{}: level {} of maximum {}",
                self.stats.name, reading.level, reading.maximum
            ))
        })?;

        self.points.push_back(SamplePoint::new(1.0, level));
        evict_offscreen(&mut self.points);

        self.recompute();
        self.stats.current_level = reading.level;
        self.stats.max_capacity  = reading.maximum;
        Ok(())
    }

    fn recompute(&mut self) {
        let mut sum = 0.0;
        let mut min = 100.0_f64;
        let mut max = 0.0_f64;
        for point in &self.points {
            sum += point.level;
            min = min.min(point.level);
            max = max.max(point.level);
        }

        // Only reachable before the first append; keep the zeroed defaults.
        if self.points.is_empty() {
            return;
        }

        self.stats.avg_level = sum / self.points.len() as f64;
        self.stats.min_level = min;
        self.stats.max_level = max;
    }
}

/// Drop leading points while both the front point and its successor have
/// scrolled fully off the left edge.  The newest point is never removed.
fn evict_offscreen(points: &mut VecDeque<SamplePoint>) {
    while points.len() >= 2 && points[0].position < 0.0 && points[1].position <= 0.0 {
        points.pop_front();
    }
}
