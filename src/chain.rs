//! Relation chains: the ordering key of one traversal path
//!
//! A chain records, for the path that led to a fragment, which value bounds
//! are still unresolved and could therefore still produce an older
//! (ascending) or newer (descending) member. Chains are small immutable
//! values; `push` returns a new, compacted chain.
//!
//! Compaction runs right to left over adjacent markers `a, b`:
//! - `a` important, `b` not: stop, `a` still gates future decisions
//! - both important: keep the more conservative bound in `a`, drop `b`
//! - `a` not important: `a` takes over `b`'s importance and value, drop `b`
//!
//! so no two adjacent markers are ever both unimportant.

use crate::condition::Range;
use crate::model::Value;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Emission order of a traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    /// Compares two values in emission order
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match self {
            Self::Ascending => a.total_cmp(b),
            Self::Descending => b.total_cmp(a),
        }
    }

    /// Compares optional marker values; a missing value sorts first in either direction
    fn compare_marker_values(&self, a: &Option<Value>, b: &Option<Value>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => self.compare(a, b),
        }
    }

    /// Returns true if `value` comes strictly before `bound` in emission order
    pub fn precedes(&self, value: &Value, bound: &Value) -> bool {
        self.compare(value, bound) == Ordering::Less
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ascending => write!(f, "ascending"),
            Self::Descending => write!(f, "descending"),
        }
    }
}

/// One step of a chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Whether the bound can still gate emission
    pub important: bool,

    /// The bound; absent for plain links
    pub value: Option<Value>,
}

impl Marker {
    pub fn important(value: Value) -> Self {
        Self {
            important: true,
            value: Some(value),
        }
    }

    pub fn unimportant() -> Self {
        Self {
            important: false,
            value: None,
        }
    }

    /// Derives the marker of a relation whose bounds are `range`
    ///
    /// Only a relation over the ordering path is important, and only when it
    /// bounds its target on the side emission approaches from: a lower bound
    /// when ascending, an upper bound when descending.
    pub fn for_range(range: Option<&Range>, direction: Direction) -> Self {
        let bound = range.and_then(|range| match direction {
            Direction::Ascending => range.min.clone(),
            Direction::Descending => range.max.clone(),
        });

        match bound {
            Some(value) => Self::important(value),
            None => Self::unimportant(),
        }
    }
}

/// The compacted ordering key of one traversal path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationChain {
    pub source: String,
    pub target: String,
    markers: Vec<Marker>,
    direction: Direction,
}

impl RelationChain {
    /// Creates the chain of a traversal root
    ///
    /// The root carries one unimportant marker: it is work that must be
    /// drained before any important chain is considered.
    pub fn root(target: impl Into<String>, direction: Direction) -> Self {
        Self {
            source: String::new(),
            target: target.into(),
            markers: vec![Marker::unimportant()],
            direction,
        }
    }

    /// Builds a chain by pushing every marker in turn
    pub fn from_markers(
        source: impl Into<String>,
        target: impl Into<String>,
        markers: impl IntoIterator<Item = Marker>,
        direction: Direction,
    ) -> Self {
        let mut chain = Self {
            source: source.into(),
            target: target.into(),
            markers: Vec::new(),
            direction,
        };
        for marker in markers {
            chain.markers.push(marker);
            chain.compact();
        }
        chain
    }

    /// Returns the chain reached by following a relation to `target`
    pub fn push(&self, target: impl Into<String>, marker: Marker) -> Self {
        let mut markers = self.markers.clone();
        markers.push(marker);

        let mut next = Self {
            source: self.target.clone(),
            target: target.into(),
            markers,
            direction: self.direction,
        };
        next.compact();
        next
    }

    fn compact(&mut self) {
        while self.markers.len() >= 2 {
            let Some(b) = self.markers.pop() else { break };
            let Some(a) = self.markers.last_mut() else { break };

            match (a.important, b.important) {
                (true, false) => {
                    self.markers.push(b);
                    break;
                }
                (true, true) => {
                    if self
                        .direction
                        .compare_marker_values(&b.value, &a.value)
                        .is_lt()
                    {
                        a.value = b.value;
                    }
                }
                (false, _) => {
                    a.important = b.important;
                    a.value = b.value;
                }
            }
        }
    }

    /// Total order used for scheduling priority and as the emission gate
    ///
    /// Unimportant work sorts before important work; important markers at the
    /// same position compare by value in emission order.
    pub fn ordering(&self, other: &Self) -> Ordering {
        for (a, b) in self.markers.iter().zip(other.markers.iter()) {
            match (a.important, b.important) {
                (false, false) => continue,
                (false, true) => return Ordering::Less,
                (true, false) => return Ordering::Greater,
                (true, true) => {
                    let ord = self.direction.compare_marker_values(&a.value, &b.value);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
            }
        }
        Ordering::Equal
    }

    /// Returns true if the chain's first marker is important
    pub fn important(&self) -> bool {
        self.markers.first().map_or(false, |m| m.important)
    }

    /// Returns the first marker, the one gating emission
    pub fn head(&self) -> Option<&Marker> {
        self.markers.first()
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }
}
