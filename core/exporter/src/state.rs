//! Engine state shared between the poll loop and the metrics server.
//!
//! The poll loop is the only writer. Scrapes take the lock just long enough
//! to copy a `MetricSnapshot`, so each scrape sees one point in the stream.

use std::sync::{Mutex, MutexGuard};

use realtime_core::{
    AggregationEngine, BatchReport, MetricSnapshot, ParsedEvent, PersistenceWriteError,
    SnapshotStore, StateLoadError,
};
use tracing::{info, warn};

pub struct SharedState {
    engine: Mutex<AggregationEngine>,
    store: Option<SnapshotStore>,
}

impl SharedState {
    pub fn new(engine: AggregationEngine, store: Option<SnapshotStore>) -> Self {
        Self {
            engine: Mutex::new(engine),
            store,
        }
    }

    /// Restores from the snapshot store when one is configured, falling back
    /// to an empty engine on any load failure.
    pub fn restore(store: Option<SnapshotStore>) -> Self {
        let engine = match store.as_ref() {
            Some(store) => match store.load() {
                Ok(engine) => {
                    let gauges = engine.gauges();
                    info!(
                        path = %store.path().display(),
                        cursor = engine.cursor(),
                        active_connections = gauges.active_connections,
                        active_projects = gauges.active_projects,
                        active_users = gauges.active_users,
                        "Restored state from snapshot"
                    );
                    engine
                }
                Err(StateLoadError::NotFound(path)) => {
                    info!(path = %path.display(), "No snapshot yet; starting empty");
                    AggregationEngine::new()
                }
                Err(err) => {
                    warn!(error = %err, "Failed to load snapshot; starting empty");
                    AggregationEngine::new()
                }
            },
            None => AggregationEngine::new(),
        };
        Self::new(engine, store)
    }

    fn lock(&self) -> MutexGuard<'_, AggregationEngine> {
        // Poisoning is ignored: gauges are rebuilt from the maps on every event.
        self.engine
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn cursor(&self) -> f64 {
        self.lock().cursor()
    }

    pub fn ingest(&self, events: Vec<ParsedEvent>) -> BatchReport {
        self.lock().ingest_batch(events)
    }

    pub fn metric_snapshot(&self) -> MetricSnapshot {
        self.lock().metric_snapshot()
    }

    /// Writes a checkpoint if a snapshot path is configured. The lock is
    /// released before any disk I/O.
    pub fn checkpoint(&self) -> Result<bool, PersistenceWriteError> {
        let Some(store) = self.store.as_ref() else {
            return Ok(false);
        };
        let snapshot = self.lock().to_snapshot();
        store.save(&snapshot)?;
        Ok(true)
    }
}
