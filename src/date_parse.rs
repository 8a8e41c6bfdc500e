//! Shared date-format ladder used by the feed parser and the video metadata
//! parser. Both fall back to "now" (feed parser) or `None` (video parser)
//! when nothing matches, logging at debug rather than failing the fetch.

use chrono::{DateTime, NaiveDateTime, Utc};

const RFC2822_STYLE: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Try the feed date-format ladder from §4.2: RFC 2822 (with numeric or named
/// offset), then the common ISO-8601 shapes feed software emits.
pub fn parse_feed_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, RFC2822_STYLE) {
        return Some(naive);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S%.fZ"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive);
        }
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    None
}

/// The video metadata ladder from §4.3: the feed ladder plus two date-only /
/// space-separated shapes used by `uploadDate`/meta fallbacks.
pub fn parse_video_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Some(dt) = parse_feed_datetime(raw) {
        return Some(dt);
    }
    let raw = raw.trim();
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive);
        }
        if fmt == "%Y-%m-%d" {
            if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, fmt) {
                return date.and_hms_opt(0, 0, 0);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rfc2822_with_named_zone() {
        let dt = parse_feed_datetime("Mon, 01 Jan 2024 00:00:00 GMT").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-01 00:00:00");
    }

    #[test]
    fn parses_iso8601_z_suffix() {
        let dt = parse_feed_datetime("2024-07-01T10:00:00Z").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-07-01 10:00:00");
    }

    #[test]
    fn video_ladder_accepts_date_only() {
        let dt = parse_video_datetime("2024-05-01").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-05-01 00:00:00");
    }

    #[test]
    fn unparseable_input_returns_none() {
        assert!(parse_feed_datetime("not a date").is_none());
    }
}
