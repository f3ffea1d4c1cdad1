//! Error types for realtime-core operations.
//!
//! Record-level rejections live in `realtime_log_protocol::RecordError`; the
//! types here cover state persistence and configuration.

use std::path::PathBuf;

// ═══════════════════════════════════════════════════════════════════════════════
// Snapshot Errors
// ═══════════════════════════════════════════════════════════════════════════════

/// A snapshot could not be turned back into engine state.
///
/// Always recoverable: callers start from an empty engine and log a warning.
#[derive(Debug, thiserror::Error)]
pub enum StateLoadError {
    #[error("State file not found: {0}")]
    NotFound(PathBuf),

    #[error("State file unreadable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("State file corrupt: {source}")]
    Corrupt {
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported state file version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("State file invalid: {0}")]
    Invalid(String),
}

/// A checkpoint could not be written. In-memory state is unaffected.
#[derive(Debug, thiserror::Error)]
#[error("Failed to write state file {path}: {source}")]
pub struct PersistenceWriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Exporter Errors
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    StateLoad(#[from] StateLoadError),

    #[error(transparent)]
    PersistenceWrite(#[from] PersistenceWriteError),
}

pub type Result<T> = std::result::Result<T, ExporterError>;
