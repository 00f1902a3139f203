//! Closed value model for materialization
//!
//! `serde_json::Value` only knows six kinds. Strings are further classified
//! into dates, GUIDs, URIs and time spans so every leaf reaches the field
//! strategies as one of twelve explicit variants.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
use uuid::Uuid;

use crate::schema::ValueKind;

/// .NET tick count of the Unix epoch (100ns intervals since 0001-01-01)
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

/// Ticks per second
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// URI schemes recognised when classifying strings
const URI_SCHEMES: &[&str] = &["http", "https", "ftp", "urn", "mailto"];

/// String classification switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyOptions {
    pub detect_dates: bool,
    pub detect_guids: bool,
    pub detect_uris: bool,
    pub detect_timespans: bool,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            detect_dates: true,
            detect_guids: true,
            detect_uris: true,
            detect_timespans: true,
        }
    }
}

impl ClassifyOptions {
    /// Treat every string as a plain string
    #[must_use]
    pub fn plain() -> Self {
        Self {
            detect_dates: false,
            detect_guids: false,
            detect_uris: false,
            detect_timespans: false,
        }
    }
}

/// A JSON value with refined leaf kinds
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Integer(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Date(DateTime<Utc>),
    TimeSpan(TimeDelta),
    Null,
    Array(Vec<JsonValue>),
    Object(Vec<(String, JsonValue)>),
    Guid(Uuid),
    Uri(Url),
    Bytes(Vec<u8>),
}

impl JsonValue {
    /// Convert a parsed JSON value, classifying strings per `options`
    #[must_use]
    pub fn from_json(value: &Value, options: &ClassifyOptions) -> Self {
        match value {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Number(number) => match number.as_i64() {
                Some(i) => JsonValue::Integer(i),
                // u64 above i64::MAX and all fractional numbers
                None => JsonValue::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => classify_string(s, options),
            Value::Array(items) => JsonValue::Array(
                items
                    .iter()
                    .map(|item| JsonValue::from_json(item, options))
                    .collect(),
            ),
            Value::Object(map) => JsonValue::from_object(map, options),
        }
    }

    #[must_use]
    pub fn from_object(map: &Map<String, Value>, options: &ClassifyOptions) -> Self {
        JsonValue::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), JsonValue::from_json(value, options)))
                .collect(),
        )
    }

    #[must_use]
    pub fn kind(&self) -> ValueKind {
        match self {
            JsonValue::Integer(_) => ValueKind::Integer,
            JsonValue::Float(_) => ValueKind::Float,
            JsonValue::String(_) => ValueKind::String,
            JsonValue::Bool(_) => ValueKind::Bool,
            JsonValue::Date(_) => ValueKind::Date,
            JsonValue::TimeSpan(_) => ValueKind::TimeSpan,
            JsonValue::Null => ValueKind::Null,
            JsonValue::Array(_) => ValueKind::Array,
            JsonValue::Object(_) => ValueKind::Object,
            JsonValue::Guid(_) => ValueKind::Guid,
            JsonValue::Uri(_) => ValueKind::Uri,
            JsonValue::Bytes(_) => ValueKind::Bytes,
        }
    }
}

fn classify_string(s: &str, options: &ClassifyOptions) -> JsonValue {
    if options.detect_dates
        && let Some(date) = parse_date(s)
    {
        return JsonValue::Date(date);
    }
    if options.detect_guids
        && s.len() == 36
        && let Ok(guid) = Uuid::parse_str(s)
    {
        return JsonValue::Guid(guid);
    }
    if options.detect_timespans
        && let Some(span) = parse_timespan(s)
    {
        return JsonValue::TimeSpan(span);
    }
    if options.detect_uris
        && let Some(uri) = parse_uri(s)
    {
        return JsonValue::Uri(uri);
    }
    JsonValue::String(s.to_string())
}

/// RFC 3339 timestamps, or ISO local timestamps interpreted as UTC
#[must_use]
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    // Cheap reject before invoking the parsers: "YYYY-MM-DDTHH:MM"
    let bytes = s.as_bytes();
    if bytes.len() < 16 || bytes[4] != b'-' || bytes[7] != b'-' || !matches!(bytes[10], b'T' | b't' | b' ') {
        return None;
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(s) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
        .ok()
        .map(|naive| naive.and_utc())
}

/// `[-][d.]hh:mm:ss[.fffffff]`
#[must_use]
pub fn parse_timespan(s: &str) -> Option<TimeDelta> {
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let mut parts = body.split(':');
    let (head, minutes, rest) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let (days, hours) = match head.split_once('.') {
        Some((days, hours)) => (parse_digits(days, 1, 8)?, hours),
        None => (0, head),
    };
    let hours = parse_digits(hours, 2, 2)?;
    let minutes = parse_digits(minutes, 2, 2)?;
    let (seconds, fraction) = match rest.split_once('.') {
        Some((seconds, fraction)) => (seconds, Some(fraction)),
        None => (rest, None),
    };
    let seconds = parse_digits(seconds, 2, 2)?;
    if hours > 23 || minutes > 59 || seconds > 59 {
        return None;
    }

    let mut ticks = days
        .checked_mul(864_000_000_000)?
        .checked_add(hours * 36_000_000_000 + minutes * 600_000_000 + seconds * TICKS_PER_SECOND)?;
    if let Some(fraction) = fraction {
        let digits = parse_digits(fraction, 1, 7)?;
        ticks = ticks.checked_add(digits * 10_i64.pow(7 - fraction.len() as u32))?;
    }

    let span = TimeDelta::nanoseconds(ticks.checked_mul(100)?);
    Some(if negative { -span } else { span })
}

fn parse_digits(s: &str, min: usize, max: usize) -> Option<i64> {
    if s.len() < min || s.len() > max || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn parse_uri(s: &str) -> Option<Url> {
    let (scheme, _) = s.split_once(':')?;
    if !URI_SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
        return None;
    }
    Url::parse(s).ok()
}

/// .NET-compatible tick count for a timestamp
#[must_use]
pub fn date_ticks(date: &DateTime<Utc>) -> i64 {
    UNIX_EPOCH_TICKS
        + date.timestamp() * TICKS_PER_SECOND
        + i64::from(date.timestamp_subsec_nanos() / 100)
}

/// Tick count for a duration, saturating beyond the representable range
#[must_use]
pub fn timespan_ticks(span: &TimeDelta) -> i64 {
    match span.num_nanoseconds() {
        Some(nanos) => nanos / 100,
        None => span.num_milliseconds().saturating_mul(10_000),
    }
}

/// Canonical `[-][d.]hh:mm:ss[.fffffff]` rendering
#[must_use]
pub fn format_timespan(span: &TimeDelta) -> String {
    let ticks = timespan_ticks(span);
    let sign = if ticks < 0 { "-" } else { "" };
    let ticks = ticks.unsigned_abs();
    let per_second = TICKS_PER_SECOND as u64;

    let days = ticks / (per_second * 86_400);
    let hours = (ticks / (per_second * 3_600)) % 24;
    let minutes = (ticks / (per_second * 60)) % 60;
    let seconds = (ticks / per_second) % 60;
    let fraction = ticks % per_second;

    let mut out = String::with_capacity(24);
    out.push_str(sign);
    if days > 0 {
        out.push_str(&format!("{days}."));
    }
    out.push_str(&format!("{hours:02}:{minutes:02}:{seconds:02}"));
    if fraction > 0 {
        out.push_str(&format!(".{fraction:07}"));
    }
    out
}
