//! Reading relations and member references out of a fetched graph

use crate::condition::{Condition, Range, TimezonePolicy};
use crate::model::{Relation, RelationKind, Triple};
use crate::vocab::{tree, RDF_TYPE};
use std::collections::HashMap;

/// Collects the outgoing relations described in a fragment
///
/// Reads every `tree:relation` node (type, target, value, path) and treats
/// `tree:view` links as plain relations. Relations without a target are
/// skipped. Order follows first appearance in the graph.
pub fn extract_relations(triples: &[Triple]) -> Vec<Relation> {
    let mut nodes: Vec<String> = Vec::new();
    let mut relations = Vec::new();

    for triple in triples {
        if triple.predicate == tree::RELATION {
            if let Some(id) = triple.object.node_id() {
                if !nodes.contains(&id) {
                    nodes.push(id);
                }
            }
        }
    }

    for node in &nodes {
        let mut kind = None;
        let mut target = None;
        let mut value = None;
        let mut path = None;

        for triple in triples.iter().filter(|t| t.has_subject(node)) {
            match triple.predicate.as_str() {
                RDF_TYPE => {
                    if let Some(k) = triple.object.as_iri().and_then(RelationKind::from_type_iri) {
                        kind = Some(k);
                    }
                }
                tree::NODE => target = target.or_else(|| triple.object.as_iri().map(str::to_string)),
                tree::VALUE => value = value.or_else(|| triple.object.as_literal().cloned()),
                tree::PATH => path = path.or_else(|| triple.object.as_iri().map(str::to_string)),
                _ => {}
            }
        }

        let Some(target) = target else {
            tracing::debug!("Skipping relation {} without a target node", node);
            continue;
        };

        relations.push(Relation {
            kind: kind.unwrap_or(RelationKind::Generic),
            target,
            value,
            path,
        });
    }

    for triple in triples.iter().filter(|t| t.predicate == tree::VIEW) {
        if let Some(view) = triple.object.as_iri() {
            if !relations.iter().any(|r| r.target == view) {
                relations.push(Relation::link(view));
            }
        }
    }

    relations
}

/// Returns the identifiers referenced through `tree:member`, in order, without duplicates
pub fn member_ids(triples: &[Triple]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for triple in triples.iter().filter(|t| t.predicate == tree::MEMBER) {
        if let Some(id) = triple.object.node_id() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// Every relation of one fragment that points at the same target
#[derive(Debug, Clone, PartialEq)]
pub struct RelationGroup {
    pub target: String,

    /// Widened range per constrained path
    pub constraints: Vec<(String, Range)>,

    /// Set when some relation to the target constrains nothing
    pub open: bool,
}

impl RelationGroup {
    /// Range promised on `path`, if the group constrains it
    pub fn range_on(&self, path: &str) -> Option<&Range> {
        if self.open {
            return None;
        }
        self.constraints
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, range)| range)
    }

    /// Returns true if the condition allows following the group's target
    pub fn is_allowed_by(&self, condition: &Condition) -> bool {
        self.open
            || self
                .constraints
                .iter()
                .all(|(path, range)| condition.match_relation(range, path))
    }
}

/// Merges relations by target, widening ranges over the same path
///
/// A relation without comparison semantics, without a path, or whose value
/// cannot be read leaves its target unconstrained.
pub fn group_relations(relations: &[Relation], policy: TimezonePolicy) -> Vec<RelationGroup> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, RelationGroup> = HashMap::new();

    for relation in relations {
        let group = groups.entry(relation.target.clone()).or_insert_with(|| {
            order.push(relation.target.clone());
            RelationGroup {
                target: relation.target.clone(),
                constraints: Vec::new(),
                open: false,
            }
        });

        let bound = match (&relation.path, &relation.value) {
            (Some(path), Some(value)) => {
                Range::from_relation(relation.kind, value, policy).map(|range| (path, range))
            }
            _ => None,
        };

        let Some((path, range)) = bound else {
            group.open = true;
            continue;
        };

        match group.constraints.iter_mut().find(|(p, _)| p == path) {
            Some((_, existing)) => existing.add(&range),
            None => group.constraints.push((path.clone(), range)),
        }
    }

    order
        .into_iter()
        .filter_map(|target| groups.remove(&target))
        .collect()
}
