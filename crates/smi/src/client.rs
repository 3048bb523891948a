use crate::parse::{parse_csv, parse_pmon};
use nvsm_core::{NvsmError, Result};
use std::process::Command;
use tracing::debug;

/// One line of source output, already split into fields.
pub type Row = Vec<String>;

/// The queries the monitor issues against its sample source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    /// One row per GPU: `name`.
    DeviceNames,
    /// One row per GPU: `utilization.gpu` (percent).
    GpuUtilization,
    /// One row per GPU: `memory.total, memory.free, memory.used` (MiB).
    MemoryUtilization,
    /// One row per GPU process: `gpu pid type fb sm mem enc dec command`.
    Processes,
}

impl Query {
    /// Command-line arguments passed to `nvidia-smi`.
    pub fn args(self) -> &'static [&'static str] {
        match self {
            Self::DeviceNames => &["--query-gpu=name", "--format=csv,noheader"],
            Self::GpuUtilization => &["--query-gpu=utilization.gpu", "--format=csv,noheader,nounits"],
            Self::MemoryUtilization => &[
                "--query-gpu=memory.total,memory.free,memory.used",
                "--format=csv,noheader,nounits",
            ],
            Self::Processes => &["pmon", "-c", "1", "-s", "mu"],
        }
    }

    /// Split raw output the way this query formats it.
    pub fn tokenize(self, text: &str) -> Vec<Row> {
        match self {
            Self::Processes => parse_pmon(text),
            _ => parse_csv(text),
        }
    }
}

/// Anything that can answer a [`Query`] with rows of fields.
///
/// Implementations block the calling thread until the answer is available.
pub trait SampleSource: Send + Sync {
    fn invoke(&self, query: Query) -> Result<Vec<Row>>;
}

/// [`SampleSource`] backed by the `nvidia-smi` executable.
#[derive(Debug, Clone)]
pub struct NvidiaSmi {
    program: String,
}

impl NvidiaSmi {
    /// Use `program` (a name on `$PATH` or an absolute path) as the tool.
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl Default for NvidiaSmi {
    fn default() -> Self {
        Self::new("nvidia-smi")
    }
}

impl SampleSource for NvidiaSmi {
    fn invoke(&self, query: Query) -> Result<Vec<Row>> {
        let output = Command::new(&self.program)
            .args(query.args())
            .output()
            .map_err(|e| NvsmError::Source(format!("cannot run '{}': {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(NvsmError::Source(format!(
                "'{}' {query:?} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let rows = query.tokenize(&stdout);
        debug!(?query, rows = rows.len(), "sample source answered");
        Ok(rows)
    }
}
