//! Log polling: read the log file, keep records newer than the cursor, feed
//! them to the engine, then checkpoint.

use std::path::Path;
use std::thread;

use fs_err as fs;
use realtime_core::{ExporterConfig, ParsedEvent, RecordError};
use realtime_log_protocol::parse_line_bytes;
use tracing::{debug, info, warn};

use crate::state::SharedState;

/// Records read from one pass over the log file.
#[derive(Debug, Default)]
pub struct LogScan {
    pub events: Vec<ParsedEvent>,
    pub malformed_lines: usize,
    pub malformed_timestamps: usize,
    pub missing_fields: usize,
}

impl LogScan {
    fn reject(&mut self, line_number: usize, err: &RecordError) {
        match err {
            RecordError::MalformedLogLine { .. } => self.malformed_lines += 1,
            RecordError::MalformedTimestamp { .. } => self.malformed_timestamps += 1,
            RecordError::MissingRequiredField(_) => self.missing_fields += 1,
        }
        debug!(line = line_number, code = err.code(), error = %err, "Skipping log record");
    }

    pub fn rejected(&self) -> usize {
        self.malformed_lines + self.malformed_timestamps + self.missing_fields
    }
}

/// Parses every line of `content`, keeping only records newer than `cursor`.
///
/// Lines are split on raw bytes so one line that is not valid UTF-8 is
/// rejected on its own instead of failing the whole read.
pub fn scan_log(content: &[u8], cursor: f64) -> LogScan {
    let mut scan = LogScan::default();
    for (index, line) in content.split(|byte| *byte == b'\n').enumerate() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match parse_line_bytes(line) {
            Ok(event) if event.time > cursor => scan.events.push(event),
            Ok(_) => {}
            Err(err) => scan.reject(index + 1, &err),
        }
    }
    scan
}

/// Outcome of one poll cycle.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub log_found: bool,
    pub applied: usize,
    pub rejected: usize,
    pub checkpointed: bool,
}

/// Runs one poll cycle. Never fails: every problem is logged and the next
/// cycle tries again.
pub fn poll_once(state: &SharedState, log_file: &Path) -> CycleSummary {
    let mut summary = CycleSummary::default();

    match fs::read(log_file) {
        Ok(content) => {
            summary.log_found = true;
            let scan = scan_log(&content, state.cursor());
            summary.rejected = scan.rejected();
            let report = state.ingest(scan.events);
            summary.applied = report.applied;

            if report.applied > 0 {
                info!(
                    applied = report.applied,
                    rejected = summary.rejected,
                    cursor = report.cursor_after,
                    "Applied new log events"
                );
            } else {
                debug!(rejected = summary.rejected, "No new log events");
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %log_file.display(), "Log file not found");
        }
        Err(err) => {
            warn!(error = %err, "Failed to read log file");
        }
    }

    match state.checkpoint() {
        Ok(written) => summary.checkpointed = written,
        Err(err) => warn!(error = %err, "Failed to persist state; will retry next cycle"),
    }

    summary
}

pub fn run(state: &SharedState, config: &ExporterConfig) -> ! {
    let log_file = config.log_file();
    let interval = config.polling_interval();
    info!(
        path = %log_file.display(),
        interval_secs = interval.as_secs(),
        "Monitoring log file"
    );

    loop {
        poll_once(state, &log_file);
        thread::sleep(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use realtime_core::{AggregationEngine, ClientLabels, SnapshotStore};

    const JOIN: &str = r#"{"msg":"user joining project","clientId":"c1","userId":"u1","projectId":"p1","time":"2024-01-01T00:00:00.000Z"}"#;
    const LEAVE: &str = r#"{"msg":"client leaving project","clientId":"c1","userId":"u1","projectId":"p1","time":"2024-01-01T00:10:00.000Z"}"#;

    #[test]
    fn scan_counts_each_rejection_kind() {
        let content = [
            JOIN,
            "{broken",
            r#"{"msg":"user joining project","userId":"u1","projectId":"p1","time":"bad"}"#,
            r#"{"msg":"user joining project","projectId":"p1","time":"2024-01-01T00:00:00.000Z"}"#,
            "",
        ]
        .join("\n");

        let scan = scan_log(content.as_bytes(), 0.0);
        assert_eq!(scan.events.len(), 1);
        assert_eq!(scan.malformed_lines, 1);
        assert_eq!(scan.malformed_timestamps, 1);
        assert_eq!(scan.missing_fields, 1);
        assert_eq!(scan.rejected(), 3);
    }

    #[test]
    fn scan_filters_records_at_or_before_cursor() {
        let content = format!("{}\n{}\n", JOIN, LEAVE);
        let join_time = realtime_log_protocol::parse_log_time("2024-01-01T00:00:00.000Z")
            .expect("time");

        let scan = scan_log(content.as_bytes(), join_time);
        assert_eq!(scan.events.len(), 1);
        assert_eq!(scan.events[0].client_id.as_deref(), Some("c1"));
    }

    #[test]
    fn poll_once_applies_log_and_checkpoints() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let log_file = temp_dir.path().join("real-time.log");
        fs::write(&log_file, format!("{}\n{}\n", JOIN, LEAVE)).expect("write log");
        let state_path = temp_dir.path().join("state.json");

        let state = SharedState::new(
            AggregationEngine::new(),
            Some(SnapshotStore::new(&state_path)),
        );
        let summary = poll_once(&state, &log_file);
        assert_eq!(
            summary,
            CycleSummary {
                log_found: true,
                applied: 2,
                rejected: 0,
                checkpointed: true,
            }
        );
        assert!(state_path.exists());

        let snapshot = state.metric_snapshot();
        assert_eq!(snapshot.project_joins.get(ClientLabels::OTHER), 1);
        assert_eq!(snapshot.session_duration.sum(), 600.0);

        let again = poll_once(&state, &log_file);
        assert_eq!(again.applied, 0);
        assert_eq!(state.metric_snapshot(), snapshot);
    }

    #[test]
    fn poll_once_picks_up_appended_lines() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let log_file = temp_dir.path().join("real-time.log");
        fs::write(&log_file, format!("{}\n", JOIN)).expect("write log");

        let state = SharedState::new(AggregationEngine::new(), None);
        poll_once(&state, &log_file);
        assert_eq!(state.metric_snapshot().gauges.active_connections, 1);

        fs::write(&log_file, format!("{}\n{}\n", JOIN, LEAVE)).expect("append log");
        let summary = poll_once(&state, &log_file);
        assert_eq!(summary.applied, 1);
        assert_eq!(state.metric_snapshot().gauges.active_connections, 0);
    }

    #[test]
    fn invalid_utf8_line_is_skipped_without_blocking_the_log() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let log_file = temp_dir.path().join("real-time.log");
        let mut content = format!("{}\n", JOIN).into_bytes();
        content.extend_from_slice(b"\xff\xfe garbage\n");
        fs::write(&log_file, &content).expect("write log");

        let state = SharedState::new(AggregationEngine::new(), None);
        let summary = poll_once(&state, &log_file);
        assert_eq!(
            summary,
            CycleSummary {
                log_found: true,
                applied: 1,
                rejected: 1,
                checkpointed: false,
            }
        );
        assert_eq!(state.metric_snapshot().gauges.active_connections, 1);

        content.extend_from_slice(format!("{}\r\n", LEAVE).as_bytes());
        fs::write(&log_file, &content).expect("append leave");
        let summary = poll_once(&state, &log_file);
        assert_eq!(summary.applied, 1);
        assert_eq!(state.metric_snapshot().session_duration.sum(), 600.0);
    }

    #[test]
    fn scan_counts_invalid_utf8_as_malformed_line() {
        let mut content = b"\xc3\x28\n".to_vec();
        content.extend_from_slice(JOIN.as_bytes());

        let scan = scan_log(&content, 0.0);
        assert_eq!(scan.events.len(), 1);
        assert_eq!(scan.malformed_lines, 1);
    }

    #[test]
    fn poll_once_survives_missing_log_file() {
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let state_path = temp_dir.path().join("state.json");
        let state = SharedState::new(
            AggregationEngine::new(),
            Some(SnapshotStore::new(&state_path)),
        );

        let summary = poll_once(&state, &temp_dir.path().join("real-time.log"));
        assert!(!summary.log_found);
        assert!(summary.checkpointed);
        assert_eq!(state.cursor(), 0.0);
    }
}
