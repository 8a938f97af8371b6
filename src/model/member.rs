//! Members: the records a replication emits

use crate::condition::TimezonePolicy;
use crate::model::{Term, Triple, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logical record extracted from one or more fragments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Identity of the member
    pub id: String,

    /// Constituent facts
    pub facts: Vec<Triple>,

    /// Value found at the stream's timestamp path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Value>,

    /// Identity of the logical object this member is a version of
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_of: Option<String>,

    /// Set when the member closes a transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_of_transaction: Option<bool>,

    /// When the member was extracted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl Member {
    /// Creates a member with only identity and facts
    pub fn new(id: impl Into<String>, facts: Vec<Triple>) -> Self {
        Self {
            id: id.into(),
            facts,
            timestamp: None,
            version_of: None,
            last_of_transaction: None,
            created: None,
        }
    }

    /// Sets the timestamp
    pub fn with_timestamp(mut self, timestamp: Value) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Returns the objects reachable from the member along a predicate path
    ///
    /// Each step follows one predicate from every node reached so far.
    pub fn values_at(&self, path: &[String]) -> Vec<&Term> {
        let mut frontier: Vec<&Term> = Vec::new();
        let mut current: Vec<String> = vec![self.id.clone()];

        for (step, predicate) in path.iter().enumerate() {
            frontier = self
                .facts
                .iter()
                .filter(|t| &t.predicate == predicate)
                .filter(|t| current.iter().any(|id| t.has_subject(id)))
                .map(|t| &t.object)
                .collect();

            if step + 1 < path.len() {
                current = frontier.iter().filter_map(|term| term.node_id()).collect();
            }
        }

        frontier
    }

    /// Returns the first literal value found along the path
    ///
    /// Date/times without a timezone are read under `policy`.
    pub fn value_at(&self, path: &[String], policy: TimezonePolicy) -> Option<Value> {
        self.values_at(path)
            .into_iter()
            .find_map(|term| term.as_literal())
            .map(|literal| Value::from_literal_in(literal, policy))
    }

    /// Returns the logical identity used for version bookkeeping
    pub fn base_id(&self) -> &str {
        self.version_of.as_deref().unwrap_or(&self.id)
    }
}
