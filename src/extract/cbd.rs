//! Concise bounded description extraction

use super::Extractor;
use crate::model::{Term, Triple};
use crate::ExtractError;
use async_trait::async_trait;
use std::collections::HashSet;

/// Extracts every triple about the member, following blank nodes
///
/// Named nodes other than the member are not expanded; they are
/// independent resources with their own descriptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct CbdExtractor;

impl CbdExtractor {
    pub fn describe(graph: &[Triple], member_id: &str) -> Vec<Triple> {
        let mut facts = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut frontier = vec![member_id.to_string()];

        while let Some(node) = frontier.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            for triple in graph.iter().filter(|t| t.has_subject(&node)) {
                if let Term::Blank(_) = triple.object {
                    if let Some(id) = triple.object.node_id() {
                        frontier.push(id);
                    }
                }
                facts.push(triple.clone());
            }
        }

        facts
    }
}

#[async_trait]
impl Extractor for CbdExtractor {
    async fn extract(
        &self,
        graph: &[Triple],
        member_id: &str,
        _shape: Option<&str>,
        _extra: &[String],
    ) -> Result<Vec<Triple>, ExtractError> {
        let facts = Self::describe(graph, member_id);
        if facts.is_empty() {
            return Err(ExtractError::Failed {
                member: member_id.to_string(),
                message: "no facts about the member in the fragment".to_string(),
            });
        }
        Ok(facts)
    }
}
