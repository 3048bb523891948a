//! Adapters turning raw source rows into per-entity readings.

use nvsm_core::{MemoryData, NvsmError, Reading, Result, StreamKind};
use nvsm_smi::{parse_value, Query, Row, SampleSource};
use tracing::warn;

/// Latest reading for one entity, index-aligned with device enumeration.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityReading {
    pub name:    String,
    /// `None` when this entity's row could not be parsed this poll.
    pub reading: Option<Reading>,
    /// Framebuffer detail, only filled by memory readings.
    pub memory:  Option<MemoryData>,
}

/// A metric kind the utilization stream can aggregate.
///
/// `receive_data` is called off the stream lock; it returns one entry per
/// row the source produced, which may be fewer than the known entities.
/// A row that fails to parse yields an entry without a reading; the call
/// only fails when no row is usable.
pub trait ReadingSource: Send + Sync {
    fn kind(&self) -> StreamKind;

    fn receive_data(&self, source: &dyn SampleSource) -> Result<Vec<EntityReading>>;
}

/// GPU compute utilization, one percentage per device.
#[derive(Debug, Default, Clone, Copy)]
pub struct GpuUtilization;

impl ReadingSource for GpuUtilization {
    fn kind(&self) -> StreamKind {
        StreamKind::Utilization
    }

    fn receive_data(&self, source: &dyn SampleSource) -> Result<Vec<EntityReading>> {
        let rows  = source.invoke(Query::GpuUtilization)?;
        let names = source.invoke(Query::DeviceNames)?;

        entity_readings(self.kind(), &rows, &names, |row| {
            let level = field(row, 0, "utilization.gpu")?;
            Ok((Reading::percent(level as f64), None))
        })
    }
}

/// One entry per row, named from `names`, with `parse` extracting the
/// reading.  Bad rows are logged and kept as entries without a reading; when
/// every row is bad the first error is returned.
pub(crate) fn entity_readings<F>(
    kind: StreamKind,
    rows: &[Row],
    names: &[Row],
    parse: F,
) -> Result<Vec<EntityReading>>
where
    F: Fn(&Row) -> Result<(Reading, Option<MemoryData>)>,
{
    let mut first_error = None;
    let mut readings = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let name = device_name(names, index);
        match parse(row) {
            Ok((reading, memory)) => readings.push(EntityReading {
                name,
                reading: Some(reading),
                memory,
            }),
            Err(e) => {
                warn!(stream = %kind, entity = %name, "unusable row: {e}");
                if first_error.is_none() {
                    first_error = Some(e);
                }
                readings.push(EntityReading { name, reading: None, memory: None });
            }
        }
    }

    match first_error {
        Some(e) if readings.iter().all(|r| r.reading.is_none()) => Err(e),
        _ => Ok(readings),
    }
}

/// Name of device `index`, falling back to a positional label when the
/// name query returned fewer rows.
pub(crate) fn device_name(names: &[Row], index: usize) -> String {
    names
        .get(index)
        .and_then(|row| row.first())
        .filter(|name| !name.is_empty())
        .cloned()
        .unwrap_or_else(|| format!("GPU {index}"))
}

/// Numeric field `index` of `row`, or a parse error naming `what`.
pub(crate) fn field(row: &Row, index: usize, what: &str) -> Result<u64> {
    row.get(index)
        .and_then(|raw| parse_value(raw))
        .ok_or_else(|| NvsmError::Parse(format!("missing or non-numeric {what} in {row:?}")))
}
