//! Timestamp parsing and presentation.
//!
//! Trackers disagree on timestamp formats: Bugzilla, GitHub and Redmine send
//! RFC 3339, Jira sends an offset without a colon (`+0000`) and NVD sends a
//! naive UTC time with fractional seconds.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use chrono_humanize::HumanTime;

pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .map(|parsed| parsed.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Absolute local time followed by a bold relative label, e.g.
/// `Tue Mar  7 10:00:00 2023, <b>7 months ago</b>`.
pub fn format_timestamp(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let absolute = timestamp.with_timezone(&Local).format("%c");
    let relative = HumanTime::from(timestamp - now);
    format!("{absolute}, <b>{relative}</b>")
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_parse_rfc3339() {
        let parsed = parse_timestamp("2023-03-07T10:00:00Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2023, 3, 7, 10, 0, 0).unwrap());
    }

    /// Test: Jira style offsets (`+0000`) are accepted.
    #[test]
    fn test_parse_offset_without_colon() {
        let parsed = parse_timestamp("2023-03-07T12:00:00.000+0200").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2023, 3, 7, 10, 0, 0).unwrap());
    }

    /// Test: NVD style naive timestamps are treated as UTC.
    #[test]
    fn test_parse_naive_timestamp() {
        let parsed = parse_timestamp("2023-03-07T10:00:00.627").unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2023, 3, 7, 10, 0, 0).unwrap() + Duration::milliseconds(627)
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_format_relative_label() {
        let now = Utc.with_ymd_and_hms(2023, 3, 10, 10, 0, 0).unwrap();
        let formatted = format_timestamp(now - Duration::days(3), now);
        assert!(formatted.ends_with("ago</b>"), "got {formatted}");
        assert!(formatted.contains("3 days"), "got {formatted}");
    }
}
