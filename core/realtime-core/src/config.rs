//! Exporter configuration.
//!
//! Values come from an optional TOML file and are then overridden by CLI
//! flags in the binary. A missing file means defaults; a malformed one is an
//! error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ExporterError, Result};

/// Name of the log file inside `logs_path`.
pub const LOG_FILE_NAME: &str = "real-time.log";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExporterConfig {
    /// Directory containing `real-time.log`.
    pub logs_path: PathBuf,
    /// Seconds between log polls.
    pub polling_time_secs: u64,
    /// Where to checkpoint engine state; no checkpoints when unset.
    pub savestate_file: Option<PathBuf>,
    pub port: u16,
    pub bind_address: String,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            logs_path: PathBuf::from("data/logs"),
            polling_time_secs: 60,
            savestate_file: None,
            port: 8000,
            bind_address: "0.0.0.0".to_string(),
        }
    }
}

impl ExporterConfig {
    pub fn log_file(&self) -> PathBuf {
        self.logs_path.join(LOG_FILE_NAME)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_time_secs.max(1))
    }

    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

pub fn load_config(path: Option<&Path>) -> Result<ExporterConfig> {
    let Some(path) = path else {
        return Ok(ExporterConfig::default());
    };

    if !path.exists() {
        return Ok(ExporterConfig::default());
    }

    let content = fs_err::read_to_string(path).map_err(|source| ExporterError::Io {
        context: format!("reading config {}", path.display()),
        source,
    })?;
    toml::from_str::<ExporterConfig>(&content).map_err(|err| ExporterError::ConfigMalformed {
        path: path.to_path_buf(),
        details: err.to_string(),
    })
}
