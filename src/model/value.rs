//! Comparable values carried by relations and member timestamps

use crate::condition::{is_exact_instant, parse_instant, TimezonePolicy};
use crate::model::Literal;
use crate::vocab::xsd;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A value that relation bounds and member timestamps can be compared on
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Number(f64),
    Date(DateTime<Utc>),
    Text(String),
}

impl Value {
    /// Interprets a literal as a comparable value
    ///
    /// Dates and numbers are recognised from their datatype. Untyped and
    /// string-typed literals are tried as a date, then as a number, and
    /// otherwise kept as text.
    pub fn from_literal(literal: &Literal) -> Self {
        let lexical = literal.lexical.trim();
        match literal.datatype.as_deref() {
            Some(xsd::DATE_TIME) | Some(xsd::DATE) => {
                parse_date(lexical).map_or_else(|| Self::Text(lexical.to_string()), Self::Date)
            }
            Some(dt) if xsd::NUMERIC.contains(&dt) => lexical
                .parse::<f64>()
                .map_or_else(|_| Self::Text(lexical.to_string()), Self::Number),
            Some(dt) if dt != xsd::STRING => Self::Text(lexical.to_string()),
            _ => {
                if let Some(date) = parse_date(lexical) {
                    Self::Date(date)
                } else if let Ok(number) = lexical.parse::<f64>() {
                    Self::Number(number)
                } else {
                    Self::Text(lexical.to_string())
                }
            }
        }
    }

    /// Interprets a literal like [`Value::from_literal`], reading a date/time
    /// that states no timezone under `policy`
    pub fn from_literal_in(literal: &Literal, policy: TimezonePolicy) -> Self {
        let value = Self::from_literal(literal);
        let lexical = literal.lexical.trim();
        let date_like = matches!(
            literal.datatype.as_deref(),
            None | Some(xsd::DATE_TIME) | Some(xsd::DATE) | Some(xsd::STRING)
        );

        match value {
            Self::Number(_) => value,
            _ if !date_like || is_exact_instant(lexical) => value,
            _ => parse_instant(lexical, policy).map_or(value, Self::Date),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::Date(_) => 1,
            Self::Text(_) => 2,
        }
    }

    /// Total order over all values
    ///
    /// Values of the same kind compare naturally. Values of differing kinds
    /// compare by kind: numbers before dates before text.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    /// Compares two values of the same kind; `None` when the kinds differ
    pub fn partial_compare(&self, other: &Self) -> Option<Ordering> {
        if self.rank() == other.rank() {
            Some(self.total_cmp(other))
        } else {
            None
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.total_cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Date(d) => write!(f, "{}", d.to_rfc3339()),
            Self::Text(t) => write!(f, "{}", t),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

/// Parses a full date-time or a calendar date (taken as midnight UTC)
fn parse_date(lexical: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(lexical) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(lexical, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
