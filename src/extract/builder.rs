//! Turning extracted facts into members

use crate::condition::TimezonePolicy;
use crate::model::{Member, Term, Triple};
use chrono::Utc;

/// Derives member metadata from the paths a stream declares
#[derive(Debug, Clone, Default)]
pub struct MemberBuilder {
    pub timestamp_path: Option<Vec<String>>,
    pub version_of_path: Option<Vec<String>>,
    pub last_of_transaction_path: Option<Vec<String>>,

    /// How timestamps without a timezone are read
    pub policy: TimezonePolicy,
}

impl MemberBuilder {
    /// Builds a member from its facts
    ///
    /// Reads the timestamp, the version-of identity and the
    /// last-of-transaction flag along their configured paths.
    pub fn build(&self, id: &str, facts: Vec<Triple>) -> Member {
        let mut member = Member::new(id, facts);
        member.created = Some(Utc::now());

        if let Some(path) = &self.timestamp_path {
            member.timestamp = member.value_at(path, self.policy);
        }

        if let Some(path) = &self.version_of_path {
            member.version_of = member
                .values_at(path)
                .into_iter()
                .find_map(Term::node_id);
        }

        if let Some(path) = &self.last_of_transaction_path {
            member.last_of_transaction = member
                .values_at(path)
                .into_iter()
                .find_map(|term| term.as_literal())
                .and_then(|literal| match literal.lexical.trim() {
                    "true" | "1" => Some(true),
                    "false" | "0" => Some(false),
                    _ => None,
                });
        }

        member
    }

    /// Rewrites a versioned member onto the object it is a version of
    ///
    /// Facts about the member become facts about its version-of identity
    /// and the version-of link itself is dropped. Unversioned members are
    /// returned unchanged.
    pub fn materialize(&self, member: Member) -> Member {
        let (Some(base), Some(path)) = (member.version_of.clone(), &self.version_of_path) else {
            return member;
        };
        let Some(link) = path.first() else {
            return member;
        };

        let original = member.id.clone();
        let facts = member
            .facts
            .into_iter()
            .filter(|t| !(t.has_subject(&original) && &t.predicate == link))
            .map(|mut t| {
                if t.has_subject(&original) {
                    t.subject = Term::iri(base.clone());
                }
                t
            })
            .collect();

        Member {
            id: base,
            facts,
            ..member
        }
    }
}
