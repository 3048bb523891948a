pub mod schema;

pub use schema::NvsmConfig;

use nvsm_core::{NvsmError, Result};
use std::path::{Path, PathBuf};

/// Load configuration from a TOML file.  Returns `NvsmConfig::default()` if
/// the file doesn't exist so the monitor always has sensible defaults.
///
/// The loaded values are validated; a file with e.g. a zero update delay is
/// rejected rather than silently producing a spinning poller.
pub fn load(path: impl AsRef<Path>) -> Result<NvsmConfig> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::warn!(
            "Config file not found at '{}'; using defaults.",
            path.display()
        );
        return Ok(NvsmConfig::default());
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| NvsmError::Config(format!("cannot read '{}': {e}", path.display())))?;

    parse(&raw)
}

/// Parse and validate configuration from a TOML string.
pub fn parse(raw: &str) -> Result<NvsmConfig> {
    let config: NvsmConfig =
        toml::from_str(raw).map_err(|e| NvsmError::Config(format!("TOML parse error: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Return the default config path, honouring `$XDG_CONFIG_HOME`.
pub fn default_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("nvidia-system-monitor").join("config.toml")
}
