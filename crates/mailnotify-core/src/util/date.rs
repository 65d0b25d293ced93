//! Date parsing.

use chrono::{DateTime, Utc};

/// IMAP `INTERNALDATE` format, e.g. `17-Jul-1996 02:44:25 -0700`.
const INTERNAL_DATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

/// Parse an IMAP `INTERNALDATE` value into UTC.
///
/// Surrounding quotes and a space-padded day (` 7-Jul-1996`) are accepted.
#[must_use]
pub fn parse_internal_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim().trim_matches('"').trim_start();
    DateTime::parse_from_str(value, INTERNAL_DATE_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_with_offset() {
        let parsed = parse_internal_date("17-Jul-1996 02:44:25 -0700").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(1996, 7, 17, 9, 44, 25).unwrap());
    }

    #[test]
    fn accepts_quotes_and_padded_day() {
        let parsed = parse_internal_date("\" 7-Jul-1996 02:44:25 +0000\"").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(1996, 7, 7, 2, 44, 25).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_internal_date("yesterday").is_none());
        assert!(parse_internal_date("").is_none());
    }
}
