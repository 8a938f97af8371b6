//! Partial date/time parsing into half-open intervals
//!
//! A literal such as `2024`, `2024-03`, `2024-03-05`, `2024-03-05T10` or
//! `2024-03-05T10:30:15.25` denotes every instant it could stand for:
//! `[start, start + one unit of its precision)`.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// How to read a date/time that states no timezone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimezonePolicy {
    /// Treat it as UTC
    Utc,

    /// Treat it as local time at a fixed offset
    Fixed(FixedOffset),

    /// It may be local time anywhere on Earth; widen by twelve hours on both sides
    #[default]
    AnywhereOnEarth,
}

impl TimezonePolicy {
    /// Policy for reading a single instant; anywhere-on-Earth falls back to UTC
    pub fn for_instants(self) -> Self {
        match self {
            Self::AnywhereOnEarth => Self::Utc,
            other => other,
        }
    }
}

impl FromStr for TimezonePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Z" | "UTC" | "utc" => Ok(Self::Utc),
            "AoE" | "aoe" | "AOE" => Ok(Self::AnywhereOnEarth),
            other => parse_offset(other)
                .map(Self::Fixed)
                .ok_or_else(|| format!("unknown timezone '{}'", other)),
        }
    }
}

impl fmt::Display for TimezonePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Utc => write!(f, "Z"),
            Self::Fixed(offset) => write!(f, "{}", offset),
            Self::AnywhereOnEarth => write!(f, "AoE"),
        }
    }
}

impl<'de> Deserialize<'de> for TimezonePolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parses `+HH:MM` / `-HH:MM`
fn parse_offset(s: &str) -> Option<FixedOffset> {
    let bytes = s.as_bytes();
    if bytes.len() != 6 || bytes[3] != b':' {
        return None;
    }
    let sign = match bytes[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours: i32 = s.get(1..3)?.parse().ok()?;
    let minutes: i32 = s.get(4..6)?.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Splits a trailing `Z` or `±HH:MM` off the literal
fn split_timezone(input: &str) -> (&str, Option<FixedOffset>) {
    if let Some(body) = input.strip_suffix('Z') {
        return (body, FixedOffset::east_opt(0));
    }
    let cut = input.len().saturating_sub(6);
    if cut > 0 {
        if let (Some(body), Some(suffix)) = (input.get(..cut), input.get(cut..)) {
            if let Some(offset) = parse_offset(suffix) {
                return (body, Some(offset));
            }
        }
    }
    (input, None)
}

fn first_of_next_month(year: i32, month: u32) -> Option<NaiveDate> {
    if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
}

/// Parses the local (timezone-free) part into `[start, end)`
fn parse_local(body: &str) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let (date_part, time_part) = match body.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (body, None),
    };

    let fields: Vec<&str> = date_part.split('-').collect();
    if fields.iter().any(|f| f.is_empty() || !f.bytes().all(|b| b.is_ascii_digit())) {
        return None;
    }

    let year: i32 = fields.first()?.parse().ok()?;
    let month: u32 = fields.get(1).map_or(Ok(1), |m| m.parse()).ok()?;
    let day: u32 = fields.get(2).map_or(Ok(1), |d| d.parse()).ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;

    let Some(time) = time_part else {
        let end = match fields.len() {
            1 => NaiveDate::from_ymd_opt(year + 1, 1, 1)?,
            2 => first_of_next_month(year, month)?,
            3 => date.succ_opt()?,
            _ => return None,
        };
        return Some((date.and_hms_opt(0, 0, 0)?, end.and_hms_opt(0, 0, 0)?));
    };

    if fields.len() != 3 {
        return None;
    }

    let parts: Vec<&str> = time.split(':').collect();
    let hour: u32 = parts.first()?.parse().ok()?;
    let minute: u32 = parts.get(1).map_or(Ok(0), |m| m.parse()).ok()?;

    let (second, nanos, step) = match parts.get(2) {
        None if parts.len() == 1 => (0, 0, Duration::hours(1)),
        None => (0, 0, Duration::minutes(1)),
        Some(sec) => match sec.split_once('.') {
            None => (sec.parse().ok()?, 0, Duration::seconds(1)),
            Some((whole, frac)) => {
                if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                let digits = frac.len().min(9);
                let scale = 10u32.pow(9 - digits as u32);
                let nanos: u32 = frac[..digits].parse::<u32>().ok()? * scale;
                (whole.parse().ok()?, nanos, Duration::nanoseconds(scale as i64))
            }
        },
    };

    if parts.len() > 3 {
        return None;
    }

    let start = date.and_hms_nano_opt(hour, minute, second, nanos)?;
    Some((start, start + step))
}

/// Parses a partial date/time into the half-open interval of instants it covers
///
/// An explicit timezone in the literal always wins. Otherwise `policy` decides;
/// under `AnywhereOnEarth` the interval is widened by twelve hours on both sides.
pub fn parse_partial(
    input: &str,
    policy: TimezonePolicy,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let (body, explicit) = split_timezone(input.trim());
    let (start, end) = parse_local(body)?;

    let offset = match (explicit, policy) {
        (Some(offset), _) => offset,
        (None, TimezonePolicy::Utc) => FixedOffset::east_opt(0)?,
        (None, TimezonePolicy::Fixed(offset)) => offset,
        (None, TimezonePolicy::AnywhereOnEarth) => {
            let slack = Duration::hours(12);
            return Some((start.and_utc() - slack, end.and_utc() + slack));
        }
    };

    let start = offset.from_local_datetime(&start).single()?;
    let end = offset.from_local_datetime(&end).single()?;
    Some((start.with_timezone(&Utc), end.with_timezone(&Utc)))
}

/// Whether the literal is a full-precision date/time with a timezone
pub fn is_exact_instant(input: &str) -> bool {
    DateTime::parse_from_rfc3339(input.trim()).is_ok()
}

/// Reads a date/time literal as one instant, the start of what it covers
pub fn parse_instant(input: &str, policy: TimezonePolicy) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input.trim()) {
        return Some(dt.with_timezone(&Utc));
    }
    parse_partial(input, policy.for_instants()).map(|(start, _)| start)
}
