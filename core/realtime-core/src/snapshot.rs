//! File-backed snapshots of the aggregation engine.
//!
//! A snapshot carries everything needed to resume after a restart without
//! resetting counters or replaying events twice: sessions, memberships, the
//! seen sets, the cursor and every counter/histogram value. Gauges are not
//! stored; they are recomputed from the restored maps.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "active_sessions": { "c1": { "start_time": 1704067200.0, "user_id": "u1" } },
//!   "project_users": { "p1": ["u1"] },
//!   "seen_projects": ["p1"],
//!   "seen_users": ["u1"],
//!   "last_time": 1704067200.0,
//!   "counters": {
//!     "project_joins": { "Other_Other": 1 },
//!     "project_leaves": {},
//!     "unique_projects": 1,
//!     "unique_users": 1,
//!     "session_duration": { "sum": 0.0, "buckets": [0, 0, ...] }
//!   }
//! }
//! ```
//!
//! `buckets` has one non-cumulative slot per histogram bound plus the `+Inf`
//! slot. Files without `version` are read as version 1.
//!
//! # Atomic Writes
//!
//! Uses temp file + rename so a crash mid-write leaves the previous
//! checkpoint intact.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::classify::ClientLabels;
use crate::engine::AggregationEngine;
use crate::error::{PersistenceWriteError, StateLoadError};
use crate::membership::ProjectMembership;
use crate::metrics::{DurationHistogram, LabeledCounter, MetricSet, SESSION_DURATION_SLOTS};
use crate::sessions::{Session, SessionTracker};

pub const SNAPSHOT_VERSION: u32 = 1;

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub active_sessions: BTreeMap<String, Session>,
    pub project_users: BTreeMap<String, BTreeSet<String>>,
    pub seen_projects: BTreeSet<String>,
    pub seen_users: BTreeSet<String>,
    pub last_time: f64,
    pub counters: CounterSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub project_joins: BTreeMap<String, u64>,
    pub project_leaves: BTreeMap<String, u64>,
    pub unique_projects: u64,
    pub unique_users: u64,
    pub session_duration: HistogramSnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramSnapshot {
    pub sum: f64,
    pub buckets: Vec<u64>,
}

impl AggregationEngine {
    pub fn to_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            version: SNAPSHOT_VERSION,
            active_sessions: self.sessions.as_map().clone(),
            project_users: self.membership.as_map().clone(),
            seen_projects: self.seen_projects.clone(),
            seen_users: self.seen_users.clone(),
            last_time: self.cursor,
            counters: CounterSnapshot {
                project_joins: counter_to_map(&self.metrics.project_joins),
                project_leaves: counter_to_map(&self.metrics.project_leaves),
                unique_projects: self.metrics.unique_projects,
                unique_users: self.metrics.unique_users,
                session_duration: HistogramSnapshot {
                    sum: self.metrics.session_duration.sum(),
                    buckets: self.metrics.session_duration.counts().to_vec(),
                },
            },
        }
    }

    /// Rebuilds an engine from a snapshot. Counters are set to their saved
    /// values; gauges are recomputed from the restored maps.
    pub fn from_snapshot(snapshot: StateSnapshot) -> Result<Self, StateLoadError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StateLoadError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        if !snapshot.last_time.is_finite() {
            return Err(StateLoadError::Invalid(
                "last_time must be a finite number".to_string(),
            ));
        }

        let counters = snapshot.counters;
        let buckets: [u64; SESSION_DURATION_SLOTS] = counters
            .session_duration
            .buckets
            .try_into()
            .map_err(|buckets: Vec<u64>| {
                StateLoadError::Invalid(format!(
                    "session_duration has {} buckets (expected {})",
                    buckets.len(),
                    SESSION_DURATION_SLOTS
                ))
            })?;

        let mut engine = AggregationEngine {
            sessions: SessionTracker::from_map(snapshot.active_sessions),
            membership: ProjectMembership::from_map(snapshot.project_users),
            seen_users: snapshot.seen_users,
            seen_projects: snapshot.seen_projects,
            cursor: snapshot.last_time,
            metrics: MetricSet {
                project_joins: counter_from_map(counters.project_joins, "project_joins")?,
                project_leaves: counter_from_map(counters.project_leaves, "project_leaves")?,
                unique_users: counters.unique_users,
                unique_projects: counters.unique_projects,
                session_duration: DurationHistogram::from_parts(
                    buckets,
                    counters.session_duration.sum,
                ),
                ..MetricSet::default()
            },
        };
        engine.recompute_gauges();
        Ok(engine)
    }
}

fn counter_to_map(counter: &LabeledCounter) -> BTreeMap<String, u64> {
    counter
        .iter()
        .map(|(labels, value)| (labels.key(), value))
        .collect()
}

fn counter_from_map(
    values: BTreeMap<String, u64>,
    name: &str,
) -> Result<LabeledCounter, StateLoadError> {
    let mut counter = LabeledCounter::default();
    for (key, value) in values {
        let labels = ClientLabels::from_key(&key).ok_or_else(|| {
            StateLoadError::Invalid(format!("{} has unknown label key {:?}", name, key))
        })?;
        counter.set(labels, value);
    }
    Ok(counter)
}

pub fn encode_snapshot(snapshot: &StateSnapshot) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(snapshot)
}

pub fn decode_snapshot(bytes: &[u8]) -> Result<StateSnapshot, StateLoadError> {
    serde_json::from_slice(bytes).map_err(|source| StateLoadError::Corrupt { source })
}

/// Reads and writes engine snapshots at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<AggregationEngine, StateLoadError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(StateLoadError::NotFound(self.path.clone()))
            }
            Err(source) => {
                return Err(StateLoadError::Unreadable {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        AggregationEngine::from_snapshot(decode_snapshot(&bytes)?)
    }

    pub fn save(&self, snapshot: &StateSnapshot) -> Result<(), PersistenceWriteError> {
        let payload = encode_snapshot(snapshot).map_err(|err| self.write_error(err.into()))?;

        let parent_dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp_file =
            NamedTempFile::new_in(parent_dir).map_err(|err| self.write_error(err))?;
        temp_file
            .write_all(&payload)
            .map_err(|err| self.write_error(err))?;
        temp_file.flush().map_err(|err| self.write_error(err))?;
        temp_file
            .persist(&self.path)
            .map_err(|err| self.write_error(err.error))?;
        Ok(())
    }

    fn write_error(&self, source: std::io::Error) -> PersistenceWriteError {
        PersistenceWriteError {
            path: self.path.clone(),
            source,
        }
    }
}
