use nvsm_core::{NvsmError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure parsed from `config.toml`.
///
/// Keys from the legacy key/value config (`updateDelay`, `graphLength`) are
/// accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NvsmConfig {
    /// Poll cadence shared by all streams, in milliseconds.
    #[serde(alias = "updateDelay")]
    pub update_delay_ms: u64,
    /// Time span covered by one full graph width, in milliseconds.
    #[serde(alias = "graphLength")]
    pub graph_length_ms: u64,
    /// Normalized distance the graph scrolls per `graph_length_ms`.
    /// `1.0` = one full width.
    #[serde(alias = "graphStep")]
    pub graph_step: f64,
    /// Executable used as the sample source.
    pub smi_command: String,
}

impl Default for NvsmConfig {
    fn default() -> Self {
        Self {
            update_delay_ms: 2_000,
            graph_length_ms: 60_000,
            graph_step:      1.0,
            smi_command:     "nvidia-smi".to_string(),
        }
    }
}

impl NvsmConfig {
    /// Reject values the poller cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.update_delay_ms == 0 {
            return Err(NvsmError::Config("update_delay_ms must be > 0".into()));
        }
        if self.graph_length_ms == 0 {
            return Err(NvsmError::Config("graph_length_ms must be > 0".into()));
        }
        if !self.graph_step.is_finite() || self.graph_step <= 0.0 {
            return Err(NvsmError::Config(format!(
                "graph_step must be a positive number, got {}",
                self.graph_step
            )));
        }
        if self.smi_command.trim().is_empty() {
            return Err(NvsmError::Config("smi_command must not be empty".into()));
        }
        Ok(())
    }

    #[must_use]
    pub fn update_delay(&self) -> Duration {
        Duration::from_millis(self.update_delay_ms)
    }
}
