//! Active client sessions keyed by client id.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Epoch seconds of the join that opened this session.
    pub start_time: f64,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTracker {
    sessions: BTreeMap<String, Session>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(sessions: BTreeMap<String, Session>) -> Self {
        Self { sessions }
    }

    /// Opens a session, returning any session it displaced for the same client.
    pub fn start(&mut self, client_id: &str, session: Session) -> Option<Session> {
        self.sessions.insert(client_id.to_string(), session)
    }

    /// Closes a session, returning it if one was open.
    pub fn end(&mut self, client_id: &str) -> Option<Session> {
        self.sessions.remove(client_id)
    }

    pub fn get(&self, client_id: &str) -> Option<&Session> {
        self.sessions.get(client_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<String, Session> {
        &self.sessions
    }
}
