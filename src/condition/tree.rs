//! Boolean conditions over member values and relation ranges

use super::datetime::TimezonePolicy;
use super::range::Range;
use crate::model::{Member, Value};
use chrono::{DateTime, Utc};

/// A constraint on one value path
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    /// Predicate path, one IRI per step
    pub path: Vec<String>,

    /// Interval the value must fall into
    pub range: Range,
}

/// A condition members must satisfy
///
/// Evaluated twice: conservatively against relation ranges while traversing
/// (never pruning a fragment that could hold a matching member), and exactly
/// against extracted members.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Condition {
    #[default]
    True,
    Leaf(Leaf),
    And(Vec<Condition>),
    Or(Vec<Condition>),
}

impl Condition {
    pub fn leaf(path: Vec<String>, range: Range) -> Self {
        Self::Leaf(Leaf { path, range })
    }

    /// Builds a time window over `path`: `after <= value < before`
    pub fn window(
        path: Vec<String>,
        after: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Self {
        let range = match (after, before) {
            (None, None) => return Self::True,
            (Some(after), None) => Range::at_least(Value::Date(after), true),
            (None, Some(before)) => Range::at_most(Value::Date(before), false),
            (Some(after), Some(before)) => Range::half_open(Value::Date(after), Value::Date(before)),
        };
        Self::leaf(path, range)
    }

    /// Conjunction, flattening trivial operands
    pub fn and(self, other: Condition) -> Self {
        match (self, other) {
            (Self::True, c) | (c, Self::True) => c,
            (Self::And(mut a), Self::And(b)) => {
                a.extend(b);
                Self::And(a)
            }
            (Self::And(mut a), c) => {
                a.push(c);
                Self::And(a)
            }
            (a, b) => Self::And(vec![a, b]),
        }
    }

    /// Returns true if the condition accepts everything
    pub fn is_trivial(&self) -> bool {
        match self {
            Self::True => true,
            Self::Leaf(_) => false,
            Self::And(children) => children.iter().all(Condition::is_trivial),
            Self::Or(children) => children.iter().any(Condition::is_trivial),
        }
    }

    /// Decides whether a relation may lead to matching members
    ///
    /// Leaves over a different path than the relation's cannot rule the
    /// relation out and answer `true`.
    ///
    /// # Arguments
    ///
    /// * `range` - Interval the relation promises its target's values fall into
    /// * `path` - Predicate IRI the relation constrains
    pub fn match_relation(&self, range: &Range, path: &str) -> bool {
        match self {
            Self::True => true,
            Self::Leaf(leaf) => {
                if leaf.path.len() == 1 && leaf.path[0] == path {
                    leaf.range.overlaps(range)
                } else {
                    true
                }
            }
            Self::And(children) => children.iter().all(|c| c.match_relation(range, path)),
            Self::Or(children) => children.iter().any(|c| c.match_relation(range, path)),
        }
    }

    /// Decides whether an extracted member is accepted
    ///
    /// A leaf accepts the member when any value along its path falls into
    /// the range; a member without a value there is rejected. Date/times
    /// without a timezone are read under `policy`.
    pub fn match_member(&self, member: &Member, policy: TimezonePolicy) -> bool {
        match self {
            Self::True => true,
            Self::Leaf(leaf) => member
                .values_at(&leaf.path)
                .into_iter()
                .filter_map(|term| term.as_literal())
                .any(|literal| leaf.range.contains(&Value::from_literal_in(literal, policy))),
            Self::And(children) => children.iter().all(|c| c.match_member(member, policy)),
            Self::Or(children) => children.iter().any(|c| c.match_member(member, policy)),
        }
    }
}
