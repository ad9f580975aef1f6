//! Lenient feed timestamp parsing. Everything is normalized to UTC.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

const OFFSET_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
    "%d %b %Y %H:%M:%S %z",
    "%a, %d %B %Y %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%d %H:%M:%S%.f %z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%a, %d %b %Y %H:%M:%S",
    "%a, %d %b %Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%a, %d %B %Y %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Offset in hours for the zone abbreviations feeds actually use.
fn named_zone_offset(abbrev: &str) -> Option<i32> {
    let hours = match abbrev.to_ascii_uppercase().as_str() {
        "UTC" | "GMT" | "UT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        "CET" => 1,
        "CEST" => 2,
        _ => return None,
    };
    Some(hours)
}

fn from_offset_datetime(dt: OffsetDateTime) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(dt.unix_timestamp(), dt.nanosecond()).single()
}

fn parse_with_offset(s: &str) -> Option<DateTime<Utc>> {
    OFFSET_FORMATS
        .iter()
        .find_map(|f| DateTime::<FixedOffset>::parse_from_str(s, f).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_naive(s: &str, offset: FixedOffset) -> Option<DateTime<Utc>> {
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a feed timestamp. Returns `None` for empty or unrecognized input.
pub fn parse_utc(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc3339) {
        return from_offset_datetime(dt);
    }
    if let Ok(dt) = OffsetDateTime::parse(s, &Rfc2822) {
        return from_offset_datetime(dt);
    }
    if let Some(dt) = parse_with_offset(s) {
        return Some(dt);
    }

    // Trailing zone abbreviation, e.g. "Mon, 02 Jan 2006 15:04:05 GMT"
    // or Go's "2020-04-20 00:00:00 +0000 UTC".
    if let Some((rest, abbrev)) = s.rsplit_once(' ') {
        if let Some(hours) = named_zone_offset(abbrev) {
            let rest = rest.trim_end();
            if let Some(dt) = parse_with_offset(rest) {
                return Some(dt);
            }
            let offset = FixedOffset::east_opt(hours * 3600)?;
            return parse_naive(rest, offset);
        }
    }

    if let Some(dt) = parse_naive(s, FixedOffset::east_opt(0)?) {
        return Some(dt);
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
