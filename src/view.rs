//! Plain-text rendering of stream snapshots.

use nvsm_system::{format_mib, EntitySnapshot, ProcessTable};

fn opt<T: std::fmt::Display>(value: Option<T>, unit: &str) -> String {
    match value {
        Some(v) => format!("{v}{unit}"),
        None    => "-".to_string(),
    }
}

/// Process table, one line per process under a header.
pub fn process_lines(table: &ProcessTable) -> Vec<String> {
    let stamp = table
        .refreshed_at
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_default();

    let mut lines = Vec::with_capacity(table.len() + 2);
    lines.push(format!("── Processes ({}) {stamp}", table.len()));
    lines.push(format!(
        "{:<20} {:<18} {:<24} {:>8} {:>8} {:>9} {:>5} {:>5}",
        "Name", "Type", "GPU", "PID", "Compute", "Memory", "Enc", "Dec"
    ));
    for p in &table.entries {
        lines.push(format!(
            "{:<20} {:<18} {:<24} {:>8} {:>8} {:>9} {:>5} {:>5}",
            p.name,
            p.kind.to_string(),
            p.entity_name,
            p.pid,
            opt(p.compute_use_percent, " %"),
            opt(p.video_memory_mb, " MB"),
            opt(p.encoding_percent, ""),
            opt(p.decoding_percent, ""),
        ));
    }
    lines
}

/// Percentage windows: current level plus window min/avg/max.
pub fn utilization_lines(title: &str, entities: &[EntitySnapshot]) -> Vec<String> {
    let mut lines = vec![format!("── {title}")];
    lines.extend(entities.iter().map(|e| {
        format!(
            "{}: {:.0}%  (avg {:.0}  min {:.0}  max {:.0}, {} points)",
            e.stats.name,
            e.stats.current_level,
            e.stats.avg_level,
            e.stats.min_level,
            e.stats.max_level,
            e.points.len(),
        )
    }));
    lines
}

/// Memory windows: used / total plus normalized min/avg/max.
pub fn memory_lines(entities: &[EntitySnapshot]) -> Vec<String> {
    let mut lines = vec!["── Memory use".to_string()];
    lines.extend(entities.iter().map(|e| {
        let detail = e
            .memory
            .map(|m| format!(", free {}", format_mib(m.free)))
            .unwrap_or_default();
        format!(
            "{}: {} / {}  (avg {:.0}%  min {:.0}%  max {:.0}%{detail})",
            e.stats.name,
            format_mib(e.stats.current_level as u64),
            format_mib(e.stats.max_capacity as u64),
            e.stats.avg_level,
            e.stats.min_level,
            e.stats.max_level,
        )
    }));
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use nvsm_core::{MemoryData, ProcessEntry, ProcessKind, SamplePoint, UtilizationData};

    fn entity(level: f64, capacity: f64, memory: Option<MemoryData>) -> EntitySnapshot {
        EntitySnapshot {
            stats: UtilizationData {
                name:          "NVIDIA T400".into(),
                current_level: level,
                max_capacity:  capacity,
                avg_level:     50.0,
                min_level:     40.0,
                max_level:     60.0,
            },
            points: vec![SamplePoint::new(0.6, 40.0), SamplePoint::new(1.0, 60.0)],
            memory,
        }
    }

    #[test]
    fn utilization_line_shows_stats() {
        let lines = utilization_lines("GPU use", &[entity(60.0, 100.0, None)]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "NVIDIA T400: 60%  (avg 50  min 40  max 60, 2 points)");
    }

    #[test]
    fn memory_line_shows_used_over_total() {
        let memory = MemoryData { total: 4096, free: 3072, used: 1024 };
        let lines = memory_lines(&[entity(1024.0, 4096.0, Some(memory))]);
        assert_eq!(
            lines[1],
            "NVIDIA T400: 1.0 GiB / 4.0 GiB  (avg 50%  min 40%  max 60%, free 3.0 GiB)"
        );
    }

    #[test]
    fn process_table_has_header_and_rows() {
        let table = ProcessTable {
            entries: vec![ProcessEntry {
                name:                "python3".into(),
                kind:                ProcessKind::Compute,
                entity_index:        0,
                pid:                 42,
                compute_use_percent: Some(97),
                memory_use_percent:  Some(40),
                encoding_percent:    None,
                decoding_percent:    None,
                video_memory_mb:     Some(4012),
                entity_name:         "NVIDIA T400".into(),
            }],
            refreshed_at: None,
        };
        let lines = process_lines(&table);
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("python3"));
        assert!(lines[2].contains("4012 MB"));
        assert!(lines[2].contains("97 %"));
    }
}
