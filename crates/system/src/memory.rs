use crate::readings::{entity_readings, field, EntityReading, ReadingSource};
use nvsm_core::{MemoryData, Result, StreamKind};
use nvsm_smi::{Query, SampleSource};

/// GPU framebuffer usage: `used` MiB out of `total` MiB per device.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryUtilization;

impl ReadingSource for MemoryUtilization {
    fn kind(&self) -> StreamKind {
        StreamKind::Memory
    }

    fn receive_data(&self, source: &dyn SampleSource) -> Result<Vec<EntityReading>> {
        let rows  = source.invoke(Query::MemoryUtilization)?;
        let names = source.invoke(Query::DeviceNames)?;

        entity_readings(self.kind(), &rows, &names, |row| {
            let memory = MemoryData {
                total: field(row, 0, "memory.total")?,
                free:  field(row, 1, "memory.free")?,
                used:  field(row, 2, "memory.used")?,
            };
            Ok((memory.reading(), Some(memory)))
        })
    }
}

/// Format a MiB count as a human-readable string (e.g. `"7.3 GiB"`).
pub fn format_mib(mib: u64) -> String {
    const GIB: u64 = 1 << 10;

    if mib >= GIB {
        format!("{:.1} GiB", mib as f64 / GIB as f64)
    } else {
        format!("{mib} MiB")
    }
}
