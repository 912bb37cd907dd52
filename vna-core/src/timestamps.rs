use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

/// Second-precision UTC, e.g. `2024-01-01T12:00:00Z`.
pub const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Formats as canonical UTC, dropping sub-second precision.
pub fn format_utc(value: DateTime<Utc>) -> String {
    value.format(CANONICAL_FORMAT).to_string()
}

/// Years that fit the four-digit canonical form.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 0..=9999;

/// Lenient parse of the timestamp shapes found in container tags. Values
/// without an offset are taken as UTC. Results outside years 0000-9999 are
/// rejected.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_any(raw).filter(|parsed| YEAR_RANGE.contains(&parsed.year()))
}

fn parse_any(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(value, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}
