//! Member coordination
//!
//! This module handles:
//! - Deduplicating member identities across fragments
//! - Running extraction on a bounded task pool reached by message passing
//! - Tracking how many extractions each fragment still has outstanding

use super::{Extractor, MemberBuilder};
use crate::model::{Member, Triple};
use crate::ExtractError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// Result of extracting one member, sent back from the worker pool
#[derive(Debug)]
pub enum ExtractionOutcome {
    Extracted {
        fragment: String,
        member: Member,
    },
    Failed {
        fragment: String,
        member_id: String,
        error: ExtractError,
    },
}

impl ExtractionOutcome {
    pub fn fragment(&self) -> &str {
        match self {
            Self::Extracted { fragment, .. } | Self::Failed { fragment, .. } => fragment,
        }
    }

    pub fn member_id(&self) -> &str {
        match self {
            Self::Extracted { member, .. } => &member.id,
            Self::Failed { member_id, .. } => member_id,
        }
    }
}

/// Dispatches member extraction and tracks it per fragment
pub struct MemberCoordinator {
    extractor: Arc<dyn Extractor>,
    builder: Arc<MemberBuilder>,
    shape: Option<String>,
    permits: Arc<Semaphore>,
    results: mpsc::UnboundedSender<ExtractionOutcome>,
    seen: HashSet<String>,
    in_progress: HashSet<String>,
    outstanding: HashMap<String, usize>,
}

impl MemberCoordinator {
    /// Creates a coordinator
    ///
    /// # Arguments
    ///
    /// * `extractor` - Extraction collaborator
    /// * `builder` - Derives member metadata from extracted facts
    /// * `shape` - Shape identifier handed to the extractor
    /// * `workers` - Maximum number of extractions running at once
    /// * `results` - Where outcomes are sent
    pub fn new(
        extractor: Arc<dyn Extractor>,
        builder: Arc<MemberBuilder>,
        shape: Option<String>,
        workers: usize,
        results: mpsc::UnboundedSender<ExtractionOutcome>,
    ) -> Self {
        Self {
            extractor,
            builder,
            shape,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            results,
            seen: HashSet::new(),
            in_progress: HashSet::new(),
            outstanding: HashMap::new(),
        }
    }

    /// Starts extracting the members a fragment references
    ///
    /// Members already seen or currently being extracted for another
    /// fragment are skipped.
    ///
    /// # Returns
    ///
    /// The number of extractions started for the fragment
    pub fn handle_page(
        &mut self,
        fragment: &str,
        graph: Arc<Vec<Triple>>,
        member_ids: impl IntoIterator<Item = String>,
    ) -> usize {
        let mut started = 0;

        for member_id in member_ids {
            if self.seen.contains(&member_id) || !self.in_progress.insert(member_id.clone()) {
                continue;
            }
            started += 1;
            self.spawn(fragment.to_string(), member_id, Arc::clone(&graph));
        }

        if started > 0 {
            *self.outstanding.entry(fragment.to_string()).or_default() += started;
        }
        tracing::debug!("Extracting {} member(s) of {}", started, fragment);
        started
    }

    fn spawn(&self, fragment: String, member_id: String, graph: Arc<Vec<Triple>>) {
        let extractor = Arc::clone(&self.extractor);
        let builder = Arc::clone(&self.builder);
        let permits = Arc::clone(&self.permits);
        let shape = self.shape.clone();
        let results = self.results.clone();

        tokio::spawn(async move {
            let outcome = match permits.acquire_owned().await {
                Ok(_permit) => {
                    match extractor
                        .extract(&graph, &member_id, shape.as_deref(), &[])
                        .await
                    {
                        Ok(facts) => ExtractionOutcome::Extracted {
                            fragment,
                            member: builder.build(&member_id, facts),
                        },
                        Err(error) => ExtractionOutcome::Failed {
                            fragment,
                            member_id,
                            error,
                        },
                    }
                }
                Err(e) => ExtractionOutcome::Failed {
                    fragment,
                    member_id,
                    error: ExtractError::Worker(e.to_string()),
                },
            };

            // The receiver is gone once the traversal is cancelled
            let _ = results.send(outcome);
        });
    }

    /// Books an outcome received from the pool
    ///
    /// # Returns
    ///
    /// `true` if the outcome's fragment has no extraction left outstanding
    pub fn complete(&mut self, outcome: &ExtractionOutcome) -> bool {
        let member_id = outcome.member_id().to_string();
        self.in_progress.remove(&member_id);
        if matches!(outcome, ExtractionOutcome::Extracted { .. }) {
            self.seen.insert(member_id);
        }

        let fragment = outcome.fragment();
        match self.outstanding.get_mut(fragment) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.outstanding.remove(fragment);
                true
            }
            None => true,
        }
    }

    /// Marks a member as handled without extracting it
    pub fn mark_seen(&mut self, member_id: &str) {
        self.seen.insert(member_id.to_string());
    }

    pub fn is_seen(&self, member_id: &str) -> bool {
        self.seen.contains(member_id)
    }

    /// Extractions still outstanding for a fragment
    pub fn outstanding(&self, fragment: &str) -> usize {
        self.outstanding.get(fragment).copied().unwrap_or(0)
    }
}
