//! Coercion of loosely typed ffprobe values.
//!
//! ffprobe reports most numbers as strings, uses `"N/A"` for unknowns and is
//! inconsistent across containers; every helper here answers `None` (or a
//! documented default) instead of failing.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::sidecar::StreamType;

const NOT_AVAILABLE: &str = "N/A";

pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => {
            let text = text.trim();
            text.is_empty() || text == NOT_AVAILABLE
        }
        _ => false,
    }
}

/// Tags as a sorted string map. Nulls are dropped; nested values become
/// compact JSON text.
pub fn normalize_tags(value: Option<&Value>) -> BTreeMap<String, String> {
    let Some(Value::Object(tags)) = value else {
        return BTreeMap::new();
    };
    tags.iter()
        .filter_map(|(key, value)| {
            let text = match value {
                Value::Null => return None,
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            Some((key.clone(), text))
        })
        .collect()
}

/// Seconds as reported, or `None` when missing, unparseable or not finite.
/// Non-positive values pass through; the poster clamp handles them.
pub fn parse_duration(value: Option<&Value>) -> Option<f64> {
    let value = value.filter(|value| !is_blank(value))?;
    let seconds = match value {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => text.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    seconds.is_finite().then_some(seconds)
}

/// Integer bits per second to kilobits, rounding half to even.
pub fn parse_bitrate_kbps(value: Option<&Value>) -> Option<u32> {
    let bits = integer(value.filter(|value| !is_blank(value))?)?;
    let kbps = (bits as f64 / 1000.0).round_ties_even();
    if kbps < 0.0 || kbps > f64::from(u32::MAX) {
        return None;
    }
    Some(kbps as u32)
}

/// Non-negative integer field such as width or channel count.
pub fn parse_count(value: Option<&Value>) -> Option<u32> {
    let number = integer(value.filter(|value| !is_blank(value))?)?;
    u32::try_from(number).ok()
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|float| float.is_finite())
                .map(|float| float.trunc() as i64)
        }),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

pub fn parse_stream_type(value: Option<&Value>) -> StreamType {
    match value
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("video") => StreamType::Video,
        Some("audio") => StreamType::Audio,
        Some("data") => StreamType::Data,
        Some("subtitle") => StreamType::Subtitle,
        _ => StreamType::Other,
    }
}

/// `disposition.default` read as a truth value.
pub fn parse_disposition_default(disposition: Option<&Value>) -> Option<bool> {
    match disposition?.get("default")? {
        Value::Null => None,
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => Some(number.as_f64().map(|n| n != 0.0).unwrap_or(true)),
        Value::String(text) => Some(!text.is_empty()),
        Value::Array(items) => Some(!items.is_empty()),
        Value::Object(fields) => Some(!fields.is_empty()),
    }
}

/// Rational frame-rate string kept verbatim, `None` when empty or `"N/A"`.
pub fn rational_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) if text.is_empty() || text == NOT_AVAILABLE => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) if number.as_f64() == Some(0.0) => None,
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Frames per second from `num/den` or a bare number, rounded to two
/// decimals. `0/0`, `N/A`, a zero denominator and non-positive rates have
/// no opinion.
pub fn parse_rational(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() || value == "0/0" || value == NOT_AVAILABLE {
        return None;
    }
    let rate = match value.split_once('/') {
        None => value.parse::<f64>().ok()?,
        Some((numerator, denominator)) => {
            let numerator = numerator.trim().parse::<f64>().ok()?;
            let denominator = denominator.trim().parse::<f64>().ok()?;
            if denominator.abs() <= f64::EPSILON {
                return None;
            }
            numerator / denominator
        }
    };
    (rate.is_finite() && rate > 0.0).then(|| round_to(rate, 2))
}

/// Pixel aspect ratio from `sample_aspect_ratio`, defaulting to square.
/// A numeric value is taken as-is unless it is zero; a `N:D` string must
/// give a positive ratio.
pub fn parse_sample_aspect_ratio(value: Option<&Value>) -> f64 {
    const SQUARE: f64 = 1.0;
    let ratio = match value {
        Some(Value::Number(number)) => {
            return number
                .as_f64()
                .filter(|ratio| *ratio != 0.0)
                .unwrap_or(SQUARE);
        }
        Some(Value::String(text)) if text != "0:1" => match text.split_once(':') {
            Some((numerator, denominator)) => {
                match (
                    numerator.trim().parse::<f64>(),
                    denominator.trim().parse::<f64>(),
                ) {
                    (Ok(numerator), Ok(denominator)) if denominator != 0.0 => {
                        numerator / denominator
                    }
                    _ => SQUARE,
                }
            }
            None => SQUARE,
        },
        _ => SQUARE,
    };
    if ratio.is_finite() && ratio > 0.0 {
        ratio
    } else {
        SQUARE
    }
}

/// String field passed through verbatim; other JSON types are ignored.
pub fn text(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}
