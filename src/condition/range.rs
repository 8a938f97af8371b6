//! Value intervals derived from relations

use super::datetime::{is_exact_instant, parse_partial, TimezonePolicy};
use crate::model::{Literal, RelationKind, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// An interval of values; a missing bound is unbounded on that side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub min_inclusive: bool,
    pub max_inclusive: bool,
}

impl Range {
    /// The interval containing every value
    pub fn unbounded() -> Self {
        Self {
            min: None,
            max: None,
            min_inclusive: true,
            max_inclusive: true,
        }
    }

    /// `[min, max]`
    pub fn closed(min: Value, max: Value) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            min_inclusive: true,
            max_inclusive: true,
        }
    }

    /// `[min, max)`
    pub fn half_open(min: Value, max: Value) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            min_inclusive: true,
            max_inclusive: false,
        }
    }

    /// Values above `min`, including it when `inclusive`
    pub fn at_least(min: Value, inclusive: bool) -> Self {
        Self {
            min: Some(min),
            min_inclusive: inclusive,
            ..Self::unbounded()
        }
    }

    /// Values below `max`, including it when `inclusive`
    pub fn at_most(max: Value, inclusive: bool) -> Self {
        Self {
            max: Some(max),
            max_inclusive: inclusive,
            ..Self::unbounded()
        }
    }

    /// Derives the interval a relation promises its target's members fall into
    ///
    /// Date literals without full precision or without a timezone cover every
    /// instant they could mean under `policy`, so bounds are taken from the
    /// widest reading. Returns `None` for kinds without comparison semantics.
    ///
    /// # Arguments
    ///
    /// * `kind` - The relation's comparison kind
    /// * `literal` - The relation's value
    /// * `policy` - How to read dates that carry no timezone
    pub fn from_relation(kind: RelationKind, literal: &Literal, policy: TimezonePolicy) -> Option<Self> {
        let (low, high) = literal_bounds(literal, kind, policy);

        let range = match kind {
            RelationKind::Equal => {
                if low == high {
                    Self::closed(low, high)
                } else {
                    Self::half_open(low, high)
                }
            }
            RelationKind::LessThan => Self::at_most(high, false),
            RelationKind::LessThanOrEqual => Self::at_most(high, true),
            RelationKind::GreaterThan => Self::at_least(low, false),
            RelationKind::GreaterThanOrEqual => Self::at_least(low, true),
            RelationKind::InBetween => {
                if low == high {
                    Self::closed(low, high)
                } else {
                    Self::half_open(low, high)
                }
            }
            RelationKind::Generic | RelationKind::Other => return None,
        };
        Some(range)
    }

    /// Widens this interval to also cover `other`
    ///
    /// Bounds of incomparable kinds are dropped, leaving that side unbounded.
    pub fn add(&mut self, other: &Range) {
        let (min, min_inclusive) = widen(
            self.min.take(),
            self.min_inclusive,
            other.min.as_ref(),
            other.min_inclusive,
            Ordering::Less,
        );
        let (max, max_inclusive) = widen(
            self.max.take(),
            self.max_inclusive,
            other.max.as_ref(),
            other.max_inclusive,
            Ordering::Greater,
        );
        self.min = min;
        self.min_inclusive = min_inclusive;
        self.max = max;
        self.max_inclusive = max_inclusive;
    }

    /// Returns true if `value` lies inside the interval
    ///
    /// A value of a different kind than a bound is never contained.
    pub fn contains(&self, value: &Value) -> bool {
        let above = match &self.min {
            None => true,
            Some(min) => match value.partial_compare(min) {
                Some(Ordering::Greater) => true,
                Some(Ordering::Equal) => self.min_inclusive,
                _ => false,
            },
        };
        let below = match &self.max {
            None => true,
            Some(max) => match value.partial_compare(max) {
                Some(Ordering::Less) => true,
                Some(Ordering::Equal) => self.max_inclusive,
                _ => false,
            },
        };
        above && below
    }

    /// Returns true if the two intervals share at least one value
    ///
    /// Symmetric. Bounds that cannot be compared are assumed to overlap.
    pub fn overlaps(&self, other: &Range) -> bool {
        fits_below(
            self.min.as_ref(),
            self.min_inclusive,
            other.max.as_ref(),
            other.max_inclusive,
        ) && fits_below(
            other.min.as_ref(),
            other.min_inclusive,
            self.max.as_ref(),
            self.max_inclusive,
        )
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

impl Default for Range {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.min_inclusive { '[' } else { '(' };
        let close = if self.max_inclusive { ']' } else { ')' };
        let min = self.min.as_ref().map_or("-inf".to_string(), |v| v.to_string());
        let max = self.max.as_ref().map_or("+inf".to_string(), |v| v.to_string());
        write!(f, "{}{}, {}{}", open, min, max, close)
    }
}

/// Lowest and highest value a literal may stand for
fn literal_bounds(literal: &Literal, kind: RelationKind, policy: TimezonePolicy) -> (Value, Value) {
    let exact = Value::from_literal(literal);

    let partial = match (&exact, kind) {
        (Value::Text(_), _) | (Value::Date(_), RelationKind::InBetween) => {
            parse_partial(&literal.lexical, policy)
        }
        (Value::Date(_), _) if !is_exact_instant(&literal.lexical) => {
            parse_partial(&literal.lexical, policy)
        }
        _ => None,
    };

    match partial {
        Some((start, end)) => (Value::Date(start), Value::Date(end)),
        None => (exact.clone(), exact),
    }
}

/// Picks the wider of two bounds; `outward` is the ordering of the wider side
fn widen(
    current: Option<Value>,
    current_inclusive: bool,
    other: Option<&Value>,
    other_inclusive: bool,
    outward: Ordering,
) -> (Option<Value>, bool) {
    let (Some(current), Some(other)) = (current, other) else {
        return (None, true);
    };

    match current.partial_compare(other) {
        None => (None, true),
        Some(Ordering::Equal) => (Some(current), current_inclusive || other_inclusive),
        Some(ord) if ord == outward => (Some(current), current_inclusive),
        Some(_) => (Some(other.clone()), other_inclusive),
    }
}

/// Returns true if a lower bound leaves room below an upper bound
fn fits_below(
    min: Option<&Value>,
    min_inclusive: bool,
    max: Option<&Value>,
    max_inclusive: bool,
) -> bool {
    let (Some(min), Some(max)) = (min, max) else {
        return true;
    };
    match min.partial_compare(max) {
        None | Some(Ordering::Less) => true,
        Some(Ordering::Equal) => min_inclusive && max_inclusive,
        Some(Ordering::Greater) => false,
    }
}
