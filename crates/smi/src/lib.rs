//! Sample source for the monitor: the `nvidia-smi` command-line tool.
//!
//! The rest of the workspace only sees [`SampleSource`], which returns rows
//! of already-split fields, so tests can substitute canned output.

pub mod client;
pub mod parse;

pub use client::{NvidiaSmi, Query, Row, SampleSource};
pub use parse::{parse_csv, parse_pmon, parse_value};
