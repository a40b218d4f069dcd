//! Time range resolution.
//!
//! Normalizes the heterogeneous date/time strings accepted at the CLI
//! boundary into a strict UTC `[start, end)` interval. Pure functions; `now`
//! is injected so tests are deterministic.

use std::sync::OnceLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::domain::error::{Result, TriageError};
use crate::domain::model::TimeRange;

/// Resolve an explicit start (required) and end (defaults to `now`).
pub fn resolve_time_range(start: &str, end: Option<&str>, now: DateTime<Utc>) -> Result<TimeRange> {
    let start_dt = parse_instant(start)?;
    let end_dt = match end {
        Some(raw) => parse_instant(raw)?,
        None => now,
    };
    TimeRange::new(start_dt, end_dt)
}

/// Parse a natural-language or structured time range.
///
/// Accepted forms:
/// - `last N minutes|hours|days|weeks`
/// - `since yesterday`, `since today`
/// - `<instant> to <instant>` where each side is `YYYY-MM-DD`,
///   `YYYY-MM-DD HH:MM:SS` or `YYYY-MM-DDTHH:MM:SS`
pub fn parse_time_range(text: &str, now: DateTime<Utc>) -> Result<TimeRange> {
    let text = text.trim().to_lowercase();

    static LAST_RE: OnceLock<Regex> = OnceLock::new();
    let last_re = LAST_RE.get_or_init(|| {
        Regex::new(r"^last\s+(\d+)\s+(minute|hour|day|week)s?$").expect("static pattern")
    });
    if let Some(caps) = last_re.captures(&text) {
        let value: i64 = caps[1]
            .parse()
            .map_err(|_| TriageError::InvalidTimeFormat(text.clone()))?;
        let delta = match &caps[2] {
            "minute" => Duration::minutes(value),
            "hour" => Duration::hours(value),
            "day" => Duration::days(value),
            _ => Duration::weeks(value),
        };
        return TimeRange::new(now - delta, now);
    }

    if text.contains("since yesterday") {
        let start = midnight_of(now - Duration::days(1));
        return TimeRange::new(start, now);
    }
    if text.contains("since today") {
        return TimeRange::new(midnight_of(now), now);
    }

    if let Some((lhs, rhs)) = text.split_once(" to ") {
        let start = parse_instant(lhs.trim())?;
        let end = parse_instant(rhs.trim())?;
        return TimeRange::new(start, end);
    }

    Err(TriageError::InvalidTimeFormat(format!(
        "cannot parse time range '{text}'; supported: 'last N minutes/hours/days/weeks', \
         'since yesterday', 'since today', or '<datetime> to <datetime>'"
    )))
}

/// Parse a single date or date-time string as a UTC instant.
pub fn parse_instant(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    // Normalize a lowercase 't' separator from pre-lowercased range input.
    let normalized = if raw.len() > 10 && raw.as_bytes().get(10) == Some(&b't') {
        let mut s = raw.to_string();
        s.replace_range(10..11, "T");
        s
    } else {
        raw.to_string()
    };

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(&normalized, "%Y-%m-%d") {
        let naive = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| TriageError::InvalidTimeFormat(raw.to_string()))?;
        return Ok(Utc.from_utc_datetime(&naive));
    }

    Err(TriageError::InvalidTimeFormat(format!(
        "cannot parse datetime '{raw}'"
    )))
}

fn midnight_of(dt: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(
        &dt.date_naive()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_else(|| dt.naive_utc()),
    )
}
