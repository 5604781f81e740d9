//! Timestamp formats.

use chrono::{SecondsFormat, Utc};

/// Current time with nanosecond precision, used for process bookkeeping
/// (`StartTime`, `EndTime`, `AbortTime`, status suffixes).
pub fn precise_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Current UTC time at second precision, as returned to routines by
/// `ctx.timestamp()`.
pub fn routine_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn precise_now_parses_back() {
        let ts = precise_now();
        assert!(ts.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(&ts).is_ok());
        // seconds + '.' + 9 digits + 'Z'
        let fraction = ts.rsplit('.').next().unwrap();
        assert_eq!(fraction.len(), 10);
    }

    #[test]
    fn routine_timestamp_has_no_fraction() {
        let ts = routine_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(!ts.contains('.'));
        assert_eq!(ts.len(), "2006-01-02T15:04:05Z".len());
    }
}
