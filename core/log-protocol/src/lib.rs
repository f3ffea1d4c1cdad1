//! Log record schema and validation for the realtime exporter.
//!
//! The realtime service writes one JSON object per line. This crate owns the
//! rules for turning such a line into a [`ParsedEvent`]: anything that fails
//! here never reaches the aggregation engine.

use serde::Deserialize;

mod time;

pub use time::{parse_log_time, LOG_TIME_FORMAT};

pub const JOIN_MESSAGE: &str = "user joining project";
pub const LEAVE_MESSAGE: &str = "client leaving project";

/// Why a log line was not turned into an event.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("log line is not a valid record: {source}")]
    MalformedLogLine {
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed timestamp: {value:?}")]
    MalformedTimestamp { value: String },

    #[error("{0} is required")]
    MissingRequiredField(&'static str),
}

impl RecordError {
    pub fn code(&self) -> &'static str {
        match self {
            RecordError::MalformedLogLine { .. } => "malformed_log_line",
            RecordError::MalformedTimestamp { .. } => "malformed_timestamp",
            RecordError::MissingRequiredField(_) => "missing_required_field",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Join,
    Leave,
    Other,
}

impl EventKind {
    pub fn from_message(msg: &str) -> Self {
        match msg {
            JOIN_MESSAGE => EventKind::Join,
            LEAVE_MESSAGE => EventKind::Leave,
            _ => EventKind::Other,
        }
    }
}

/// Raw record as it appears in the log. Every field is optional here;
/// [`LogRecord::validate`] decides what is required.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// A record that passed validation. `time` is already decoded to epoch seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub kind: EventKind,
    pub time: f64,
    pub user_id: String,
    pub project_id: String,
    pub client_id: Option<String>,
    pub user_agent: Option<String>,
}

impl LogRecord {
    pub fn validate(self) -> Result<ParsedEvent, RecordError> {
        let msg = require_string(self.msg, "msg")?;
        let user_id = require_string(self.user_id, "userId")?;
        let project_id = require_string(self.project_id, "projectId")?;
        let time = require_string(self.time, "time")?;
        let time = parse_log_time(&time)?;

        Ok(ParsedEvent {
            kind: EventKind::from_message(&msg),
            time,
            user_id,
            project_id,
            client_id: self.client_id.filter(|value| !value.is_empty()),
            user_agent: self.user_agent,
        })
    }
}

/// Parses and validates one line of the log.
pub fn parse_line(line: &str) -> Result<ParsedEvent, RecordError> {
    parse_line_bytes(line.as_bytes())
}

/// Same as [`parse_line`] for a raw line; invalid UTF-8 is a `MalformedLogLine`.
pub fn parse_line_bytes(line: &[u8]) -> Result<ParsedEvent, RecordError> {
    let record: LogRecord = serde_json::from_slice(line)
        .map_err(|source| RecordError::MalformedLogLine { source })?;
    record.validate()
}

fn require_string(value: Option<String>, field: &'static str) -> Result<String, RecordError> {
    match value {
        Some(candidate) if !candidate.trim().is_empty() => Ok(candidate),
        _ => Err(RecordError::MissingRequiredField(field)),
    }
}
