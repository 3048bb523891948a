pub mod error;
pub mod event;
pub mod state;

pub use error::{NvsmError, Result};
pub use event::{Message, StreamKind};
pub use state::{
    MemoryData, ProcessEntry, ProcessKind, Reading, SamplePoint, UtilizationData,
};
