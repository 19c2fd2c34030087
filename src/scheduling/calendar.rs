//! Calendar dates and time-of-day values as they arrive from the admin UI.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};

use super::SchedulingError;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Turns whatever the date picker sent into a calendar date.
///
/// Accepts a plain `YYYY-MM-DD`, an ISO/RFC 3339 timestamp (the date is taken
/// as written, in the timestamp's own offset), `YYYY/MM/DD` and the day-first
/// `DD/MM/YYYY` / `DD-MM-YYYY` locale forms.
pub fn normalize_date(raw: &str) -> Result<NaiveDate, SchedulingError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(SchedulingError::Validation("date is required".into()));
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(d);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(dt.date());
        }
    }

    Err(SchedulingError::Validation(format!(
        "date must be YYYY-MM-DD (got {s:?})"
    )))
}

/// `HH:MM` or `HH:MM:SS`. Seconds are dropped; slots are minute-granular.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, SchedulingError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(SchedulingError::Validation("time is required".into()));
    }

    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map(truncate_to_minute)
        .map_err(|_| SchedulingError::Validation(format!("time must be HH:MM (got {s:?})")))
}

pub fn format_time_of_day(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

fn truncate_to_minute(t: NaiveTime) -> NaiveTime {
    use chrono::Timelike;
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}

/// Serde adapter so time-of-day values travel as `"09:30"`.
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_time_of_day(*t))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_time_of_day(&raw).map_err(serde::de::Error::custom)
    }
}
