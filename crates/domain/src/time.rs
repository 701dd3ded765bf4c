//! Time and timestamp helpers.

use chrono::{DateTime, SecondsFormat, Utc};

/// UTC timestamp used for `created_at`, `last_run`, `next_run`, log times, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Render a timestamp the way it is persisted (RFC 3339, lossless sub-seconds).
#[must_use]
pub fn to_storage_string(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a persisted RFC 3339 timestamp back into UTC.
///
/// # Errors
///
/// Returns the chrono parse error when `value` is not RFC 3339.
pub fn parse_storage_string(value: &str) -> Result<Timestamp, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_roundtrip_through_storage_string() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 23, 30, 0).unwrap();
        let text = to_storage_string(ts);
        assert_eq!(text, "2024-01-01T23:30:00Z");
        assert_eq!(parse_storage_string(&text).unwrap(), ts);
    }
}
