//! Fragment references and the relations linking fragments

use crate::model::Literal;
use crate::vocab::tree;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reference to one fragment of the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentRef {
    /// Target identifier (URL) of the fragment
    pub url: String,

    /// Origins this fragment is expected to link back to; links to them are not followed
    #[serde(default)]
    pub expected: Vec<String>,

    /// Whether the fragment was classified as mutable on its last fetch
    #[serde(default)]
    pub mutable: bool,

    /// When the fragment was first discovered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// When the fragment was last reclassified
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl FragmentRef {
    /// Creates a reference discovered now
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expected: Vec::new(),
            mutable: false,
            created: Some(Utc::now()),
            updated: None,
        }
    }

    /// Adds an origin that should not be re-enqueued from this fragment
    pub fn expecting(mut self, origin: impl Into<String>) -> Self {
        self.expected.push(origin.into());
        self
    }

    /// Returns true if a link to `target` points back at an expected origin
    pub fn expects(&self, target: &str) -> bool {
        self.expected.iter().any(|origin| origin == target)
    }
}

/// Comparison kind of a relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationKind {
    Equal,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    InBetween,
    /// A plain link without comparison semantics
    Generic,
    /// A typed relation the core cannot evaluate (prefix, geospatial, ...)
    Other,
}

impl RelationKind {
    /// Maps a relation type IRI onto its kind
    pub fn from_type_iri(iri: &str) -> Option<Self> {
        let local = iri.strip_prefix(tree::NS)?;
        let kind = match local {
            "EqualToRelation" => Self::Equal,
            "LessThanRelation" => Self::LessThan,
            "LessThanOrEqualToRelation" => Self::LessThanOrEqual,
            "GreaterThanRelation" => Self::GreaterThan,
            "GreaterThanOrEqualToRelation" => Self::GreaterThanOrEqual,
            "InBetweenRelation" => Self::InBetween,
            "Relation" => Self::Generic,
            _ if local.ends_with("Relation") => Self::Other,
            _ => return None,
        };
        Some(kind)
    }

    /// Returns the type IRI for this kind
    pub fn type_iri(&self) -> String {
        let local = match self {
            Self::Equal => "EqualToRelation",
            Self::LessThan => "LessThanRelation",
            Self::LessThanOrEqual => "LessThanOrEqualToRelation",
            Self::GreaterThan => "GreaterThanRelation",
            Self::GreaterThanOrEqual => "GreaterThanOrEqualToRelation",
            Self::InBetween => "InBetweenRelation",
            Self::Generic | Self::Other => "Relation",
        };
        tree::iri(local)
    }

    /// Returns true if this kind carries a comparable bound
    pub fn is_comparison(&self) -> bool {
        !matches!(self, Self::Generic | Self::Other)
    }
}

/// A typed, optionally value-bearing edge between two fragments
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub kind: RelationKind,

    /// Target fragment URL
    pub target: String,

    /// Literal the comparison is made against
    pub value: Option<Literal>,

    /// Predicate IRI of the member property the relation constrains
    pub path: Option<String>,
}

impl Relation {
    /// Creates a plain link with no comparison semantics
    pub fn link(target: impl Into<String>) -> Self {
        Self {
            kind: RelationKind::Generic,
            target: target.into(),
            value: None,
            path: None,
        }
    }

    /// Creates a comparison relation over `path`
    pub fn compare(
        kind: RelationKind,
        target: impl Into<String>,
        path: impl Into<String>,
        value: Literal,
    ) -> Self {
        Self {
            kind,
            target: target.into(),
            value: Some(value),
            path: Some(path.into()),
        }
    }
}
