//! Aggregation engine: the single owner of sessions, memberships and metrics.
//!
//! Every validated event goes through [`AggregationEngine::apply`], which
//! updates the trackers and counters and then recomputes the gauges from the
//! trackers. Gauges are never adjusted incrementally, so they cannot drift
//! from the maps they describe.
//!
//! Batches go through [`AggregationEngine::ingest_batch`], which drops events
//! at or before the cursor, applies the rest in time order and advances the
//! cursor.

use std::collections::BTreeSet;

use realtime_log_protocol::{EventKind, ParsedEvent};
use tracing::debug;

use crate::classify::{classify_user_agent, ClientLabels};
use crate::membership::ProjectMembership;
use crate::metrics::{Gauges, MetricSet, MetricSnapshot};
use crate::sessions::{Session, SessionTracker};

/// Which branch of the state machine an event took.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Joined { replaced_session: bool },
    Left { duration: f64 },
    UnmatchedLeave,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchReport {
    pub applied: usize,
    pub already_seen: usize,
    pub cursor_before: f64,
    pub cursor_after: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationEngine {
    pub(crate) sessions: SessionTracker,
    pub(crate) membership: ProjectMembership,
    pub(crate) seen_users: BTreeSet<String>,
    pub(crate) seen_projects: BTreeSet<String>,
    pub(crate) cursor: f64,
    pub(crate) metrics: MetricSet,
}

impl AggregationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &ParsedEvent) -> EventOutcome {
        let labels = classify_user_agent(event.user_agent.as_deref());

        if self.seen_users.insert(event.user_id.clone()) {
            self.metrics.unique_users = self.metrics.unique_users.saturating_add(1);
        }
        if self.seen_projects.insert(event.project_id.clone()) {
            self.metrics.unique_projects = self.metrics.unique_projects.saturating_add(1);
        }

        let outcome = match event.kind {
            EventKind::Join => self.apply_join(event, labels),
            EventKind::Leave => self.apply_leave(event, labels),
            EventKind::Other => EventOutcome::Ignored,
        };

        self.recompute_gauges();
        outcome
    }

    fn apply_join(&mut self, event: &ParsedEvent, labels: ClientLabels) -> EventOutcome {
        self.metrics.project_joins.inc(labels);

        // Last join wins: a displaced session records no duration and no leave.
        let replaced_session = match event.client_id.as_deref() {
            Some(client_id) => {
                let displaced = self.sessions.start(
                    client_id,
                    Session {
                        start_time: event.time,
                        user_id: event.user_id.clone(),
                    },
                );
                if let Some(previous) = displaced.as_ref() {
                    debug!(
                        client_id = %client_id,
                        previous_start = previous.start_time,
                        "Join replaced an open session without recording its duration"
                    );
                }
                displaced.is_some()
            }
            None => false,
        };

        self.membership.join(&event.project_id, &event.user_id);
        EventOutcome::Joined { replaced_session }
    }

    fn apply_leave(&mut self, event: &ParsedEvent, labels: ClientLabels) -> EventOutcome {
        self.metrics.project_leaves.inc(labels);

        let ended = event
            .client_id
            .as_deref()
            .and_then(|client_id| self.sessions.end(client_id));

        let outcome = match ended {
            Some(session) => {
                let duration = event.time - session.start_time;
                self.metrics.session_duration.observe(duration);
                EventOutcome::Left { duration }
            }
            None => {
                debug!(
                    client_id = ?event.client_id,
                    project_id = %event.project_id,
                    "Leave without a tracked session; duration not recorded"
                );
                EventOutcome::UnmatchedLeave
            }
        };

        self.membership.leave(&event.project_id, &event.user_id);
        outcome
    }

    pub(crate) fn recompute_gauges(&mut self) {
        self.metrics.gauges = Gauges {
            active_connections: self.sessions.len() as u64,
            active_projects: self.membership.active_projects() as u64,
            active_users: self.membership.active_users() as u64,
        };
    }

    /// Applies the events newer than the cursor in ascending time order and
    /// advances the cursor to the newest applied timestamp.
    pub fn ingest_batch(&mut self, events: Vec<ParsedEvent>) -> BatchReport {
        let cursor_before = self.cursor;
        let total = events.len();

        let mut fresh: Vec<ParsedEvent> = events
            .into_iter()
            .filter(|event| event.time > cursor_before)
            .collect();
        // Stable: events sharing a timestamp keep their log order.
        fresh.sort_by(|a, b| a.time.total_cmp(&b.time));

        for event in &fresh {
            self.apply(event);
        }

        if let Some(newest) = fresh.last() {
            self.cursor = self.cursor.max(newest.time);
        }

        BatchReport {
            applied: fresh.len(),
            already_seen: total - fresh.len(),
            cursor_before,
            cursor_after: self.cursor,
        }
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn sessions(&self) -> &SessionTracker {
        &self.sessions
    }

    pub fn membership(&self) -> &ProjectMembership {
        &self.membership
    }

    pub fn seen_users(&self) -> &BTreeSet<String> {
        &self.seen_users
    }

    pub fn seen_projects(&self) -> &BTreeSet<String> {
        &self.seen_projects
    }

    pub fn metrics(&self) -> &MetricSet {
        &self.metrics
    }

    pub fn metric_snapshot(&self) -> MetricSnapshot {
        self.metrics.clone()
    }

    pub fn gauges(&self) -> Gauges {
        self.metrics.gauges
    }

    pub fn unique_users(&self) -> u64 {
        self.metrics.unique_users
    }

    pub fn unique_projects(&self) -> u64 {
        self.metrics.unique_projects
    }

    pub fn joins(&self, labels: ClientLabels) -> u64 {
        self.metrics.project_joins.get(labels)
    }

    pub fn leaves(&self, labels: ClientLabels) -> u64 {
        self.metrics.project_leaves.get(labels)
    }
}
