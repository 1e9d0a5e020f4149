use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;

const INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A sparse event as produced by the event forms: a calendar date plus
/// optional `HH:MM` clock times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub date: String,
    #[serde(default, alias = "startTime", skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, alias = "endTime", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

impl EventRecord {
    pub fn on(date: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            start_time: None,
            end_time: None,
        }
    }

    pub fn starting(mut self, time: impl Into<String>) -> Self {
        self.start_time = Some(time.into());
        self
    }

    pub fn ending(mut self, time: impl Into<String>) -> Self {
        self.end_time = Some(time.into());
        self
    }
}

/// Timezone-naive start/end pair on a single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventInstant {
    #[serde(serialize_with = "ser_instant")]
    pub start: NaiveDateTime,
    #[serde(serialize_with = "ser_instant")]
    pub end: NaiveDateTime,
}

impl EventInstant {
    /// True when the end precedes the start. Normalization never rejects this.
    pub fn is_inverted(&self) -> bool {
        self.end < self.start
    }
}

fn ser_instant<S: serde::Serializer>(v: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&v.format(INSTANT_FORMAT).to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Accept `YYYY-MM-DDTHH:MM...` dates and use their calendar-day prefix.
    pub accept_datetime_dates: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            accept_datetime_dates: true,
        }
    }
}

pub fn normalize(record: &EventRecord) -> Result<EventInstant, NormalizeError> {
    normalize_with(record, &NormalizeOptions::default())
}

pub fn normalize_with(
    record: &EventRecord,
    opts: &NormalizeOptions,
) -> Result<EventInstant, NormalizeError> {
    let day = parse_day(&record.date, opts)?;

    let start = match present(record.start_time.as_deref()) {
        Some(t) => day.and_time(parse_hh_mm("start_time", t)?),
        None => day.and_time(NaiveTime::MIN),
    };
    let end = match present(record.end_time.as_deref()) {
        Some(t) => day.and_time(parse_hh_mm("end_time", t)?),
        None => day.and_time(end_of_day()),
    };

    Ok(EventInstant { start, end })
}

fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
}

// Untouched time inputs arrive as "". Anything else is parsed as given.
fn present(v: Option<&str>) -> Option<&str> {
    v.filter(|s| !s.trim().is_empty())
}

fn parse_day(raw: &str, opts: &NormalizeOptions) -> Result<NaiveDate, NormalizeError> {
    let malformed = || NormalizeError::MalformedDate(raw.to_string());
    let s = raw.trim();
    let (date_part, has_time) = match s.split_once('T') {
        Some((d, _)) if opts.accept_datetime_dates => (d, true),
        _ => (s, false),
    };
    if date_part.len() != 10 {
        return Err(malformed());
    }
    let day = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|_| malformed())?;
    if has_time && !is_iso_datetime(s) {
        return Err(malformed());
    }
    Ok(day)
}

/// `YYYY-MM-DDTHH:MM[:SS[.fff]]` with an optional `Z` or UTC offset.
fn is_iso_datetime(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(s, fmt).is_ok())
}

fn parse_hh_mm(field: &'static str, raw: &str) -> Result<NaiveTime, NormalizeError> {
    let malformed = || NormalizeError::MalformedTime {
        field,
        value: raw.to_string(),
    };
    let b = raw.as_bytes();
    if b.len() != 5 || b[2] != b':' {
        return Err(malformed());
    }
    if ![b[0], b[1], b[3], b[4]].iter().all(u8::is_ascii_digit) {
        return Err(malformed());
    }
    NaiveTime::parse_from_str(raw, "%H:%M").map_err(|_| malformed())
}

/// A calendar-feed entry: an event record plus what the calendar shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(flatten)]
    pub record: EventRecord,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    #[serde(flatten)]
    pub instant: EventInstant,
    pub all_day: bool,
}

pub fn to_calendar_item(
    event: &CalendarEvent,
    opts: &NormalizeOptions,
) -> Result<CalendarItem, NormalizeError> {
    let instant = normalize_with(&event.record, opts)?;
    let all_day = present(event.record.start_time.as_deref()).is_none()
        && present(event.record.end_time.as_deref()).is_none();
    Ok(CalendarItem {
        id: event.id.clone(),
        title: event.title.clone(),
        instant,
        all_day,
    })
}

/// Normalizes each entry independently; one bad entry does not hide the rest.
pub fn normalize_events(
    events: &[CalendarEvent],
    opts: &NormalizeOptions,
) -> Vec<Result<CalendarItem, NormalizeError>> {
    events.iter().map(|e| to_calendar_item(e, opts)).collect()
}
