//! # realtime-core
//!
//! Turns realtime join/leave log events into rolling metrics: counters per
//! client family, first-seen user/project counters, a session duration
//! histogram and gauges of what is active right now.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency.
//! - **Single writer**: [`AggregationEngine`] is not thread-safe; the binary
//!   wraps it in a `Mutex` and only the poll loop mutates it.
//! - **Derived gauges**: Gauges are recomputed from the session and membership
//!   maps after every event and after every restore.
//! - **Graceful degradation**: Bad records are skipped, bad snapshots fall
//!   back to an empty engine, failed checkpoints are retried next cycle.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use realtime_core::{AggregationEngine, SnapshotStore};
//!
//! let store = SnapshotStore::new("state.json");
//! let mut engine = store.load().unwrap_or_default();
//! engine.ingest_batch(events);
//! store.save(&engine.to_snapshot())?;
//! ```

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod exposition;
pub mod membership;
pub mod metrics;
pub mod patterns;
pub mod sessions;
pub mod snapshot;

pub use classify::{classify_user_agent, Browser, ClientLabels, OperatingSystem};
pub use config::{load_config, ExporterConfig, LOG_FILE_NAME};
pub use engine::{AggregationEngine, BatchReport, EventOutcome};
pub use error::{ExporterError, PersistenceWriteError, Result, StateLoadError};
pub use exposition::{render_prometheus, CONTENT_TYPE, EXPORTER_VERSION};
pub use membership::ProjectMembership;
pub use metrics::{
    DurationHistogram, Gauges, LabeledCounter, MetricSet, MetricSnapshot,
    SESSION_DURATION_BOUNDS, SESSION_DURATION_SLOTS,
};
pub use sessions::{Session, SessionTracker};
pub use snapshot::{
    decode_snapshot, encode_snapshot, SnapshotStore, StateSnapshot, SNAPSHOT_VERSION,
};

pub use realtime_log_protocol::{parse_line, parse_line_bytes, EventKind, ParsedEvent, RecordError};
