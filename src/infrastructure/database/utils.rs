//! Timestamp parsing/formatting helpers shared by the SQLite repository
//! implementations.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

/// The canonical stored-timestamp offset (§4.1 decision): every timestamp this
/// crate writes to the Store is rendered in `+08:00`, regardless of the host
/// process's local timezone.
#[must_use]
pub fn storage_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("+08:00 is a valid fixed offset")
}

/// Formats a timestamp as RFC3339 in the canonical `+08:00` storage offset.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use mediabroker::infrastructure::database::utils::format_datetime;
///
/// let dt = Utc.with_ymd_and_hms(2026, 7, 28, 4, 0, 0).unwrap();
/// assert_eq!(format_datetime(dt), "2026-07-28T12:00:00+08:00");
/// ```
#[must_use]
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&storage_offset()).to_rfc3339()
}

/// Parses a timestamp stored in one of the formats this crate or SQLite's own
/// `strftime` defaults might produce: RFC3339 first (any offset, including the
/// `+08:00` this crate writes), then SQLite's `"%Y-%m-%d %H:%M:%S"`, then a bare
/// ISO8601 datetime with no offset (assumed UTC).
///
/// ```
/// use mediabroker::infrastructure::database::utils::parse_datetime;
///
/// let dt = parse_datetime("2026-07-28T12:00:00+08:00").unwrap();
/// assert_eq!(dt.to_rfc3339(), "2026-07-28T04:00:00+00:00");
/// ```
///
/// # Errors
///
/// Returns the last format's parse error if none of the three accepted formats match.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
    }
    match NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        Ok(naive) => Ok(DateTime::from_naive_utc_and_offset(naive, Utc)),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_rfc3339() {
        assert!(parse_datetime("2026-07-28T12:00:00+08:00").is_ok());
    }

    #[test]
    fn format_datetime_renders_plus_eight_offset() {
        let dt = chrono::TimeZone::with_ymd_and_hms(&Utc, 2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_datetime(dt), "2026-01-01T08:00:00+08:00");
    }

    #[test]
    fn format_then_parse_round_trips_to_same_instant() {
        let dt = Utc::now().with_nanosecond(0).unwrap();
        let formatted = format_datetime(dt);
        assert!(formatted.ends_with("+08:00"));
        assert_eq!(parse_datetime(&formatted).unwrap(), dt);
    }

    #[test]
    fn parses_sqlite_default_format() {
        assert!(parse_datetime("2026-07-28 12:00:00").is_ok());
    }

    #[test]
    fn parses_bare_iso8601() {
        assert!(parse_datetime("2026-07-28T12:00:00").is_ok());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_datetime("not-a-date").is_err());
    }
}
