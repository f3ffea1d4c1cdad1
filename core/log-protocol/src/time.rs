//! Decoding of the fixed-format `time` field carried by every log record.

use chrono::NaiveDateTime;

use crate::RecordError;

/// Format written by the realtime service, e.g. `2024-01-01T00:10:00.000Z`.
pub const LOG_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

const DATE_TIME_LEN: usize = "YYYY-MM-DDTHH:MM:SS".len();

/// Converts a log timestamp to epoch seconds.
///
/// The trailing `Z` marks UTC, so the result does not depend on the host
/// timezone. The fraction is mandatory and carries 1 to 9 digits.
pub fn parse_log_time(value: &str) -> Result<f64, RecordError> {
    let malformed = || RecordError::MalformedTimestamp {
        value: value.to_string(),
    };
    if !has_log_time_shape(value) {
        return Err(malformed());
    }

    let parsed = NaiveDateTime::parse_from_str(value, LOG_TIME_FORMAT).map_err(|_| malformed())?;
    let utc = parsed.and_utc();
    Ok(utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_nanos()) / 1_000_000_000.0)
}

/// `YYYY-MM-DDTHH:MM:SS` followed by `.`, 1 to 9 digits and `Z`, nothing else.
fn has_log_time_shape(value: &str) -> bool {
    let Some(rest) = value.strip_suffix('Z') else {
        return false;
    };
    let Some((date_time, fraction)) = rest.split_once('.') else {
        return false;
    };
    date_time.len() == DATE_TIME_LEN
        && date_time.bytes().all(|byte| byte.is_ascii_digit() || b"-T:".contains(&byte))
        && (1..=9).contains(&fraction.len())
        && fraction.bytes().all(|byte| byte.is_ascii_digit())
}
