use thiserror::Error;

/// Top-level error type used across the entire application.
#[derive(Debug, Error)]
pub enum NvsmError {
    #[error("config error: {0}")]
    Config(String),

    /// The external sample source could not be invoked or exited unsuccessfully.
    #[error("sample source error: {0}")]
    Source(String),

    /// The sample source answered, but its output could not be understood.
    #[error("parse error: {0}")]
    Parse(String),

    /// A reading that cannot be normalized (e.g. zero capacity).
    #[error("invalid reading: {0}")]
    InvalidReading(String),

    /// Signalling a process failed.
    #[error("process control error: {0}")]
    Process(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

pub type Result<T, E = NvsmError> = std::result::Result<T, E>;
