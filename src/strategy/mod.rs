//! Traversal strategies
//!
//! This module contains:
//! - The fragment job the scheduler persists
//! - The unordered and ordered strategies and their shared core
//! - The single-task event driver: fetch results, extraction results, the
//!   poll timer and consumer demand all arrive as messages
//! - The replicator, which wires everything together

mod ordered;
mod replicator;
mod traversal;
mod unordered;

pub use replicator::Replicator;

pub(crate) use ordered::OrderedStrategy;
pub(crate) use unordered::UnorderedStrategy;

pub(crate) use traversal::{FetchSignal, Inbox, Settings, Traversal};

use crate::chain::{Direction, RelationChain};
use crate::extract::ExtractionOutcome;
use crate::model::FragmentRef;
use crate::Result;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// A scheduled fragment fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentJob {
    pub fragment: FragmentRef,

    /// Ordering key of the path that led to the fragment
    pub chain: RelationChain,
}

impl FragmentJob {
    /// Job for a fragment the traversal starts from
    pub fn root(url: &str, direction: Direction) -> Self {
        Self {
            fragment: FragmentRef::new(url),
            chain: RelationChain::root(url, direction),
        }
    }
}

/// Event handlers of a traversal strategy
///
/// Handlers run one at a time on the driver task, which makes the driver
/// the only place the scheduler and the strategy's bookkeeping are touched.
pub(crate) trait Strategy: Send {
    fn traversal(&mut self) -> &mut Traversal;

    /// Seeds or resumes the traversal
    fn start(&mut self) -> Result<()>;

    fn on_fetched(&mut self, signal: FetchSignal) -> Result<()>;

    fn on_extracted(&mut self, outcome: ExtractionOutcome) -> Result<()>;

    fn on_poll(&mut self) -> Result<()>;
}

/// Runs a strategy until it closes or is cancelled
pub(crate) async fn drive<S: Strategy>(mut strategy: S, mut inbox: Inbox, cancel: CancellationToken) {
    if let Err(e) = strategy.start() {
        strategy.traversal().fail(e);
        return;
    }

    while !strategy.traversal().is_closed() {
        let step = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                strategy.traversal().cancelled();
                break;
            }
            Some(signal) = inbox.fetched.recv() => strategy.on_fetched(signal),
            Some(outcome) = inbox.extracted.recv() => strategy.on_extracted(outcome),
            Some(()) = inbox.poll.recv() => strategy.on_poll(),
            demand = inbox.demand.recv() => match demand {
                Some(()) => strategy.traversal().on_demand(),
                None => {
                    // The consumer is gone
                    cancel.cancel();
                    Ok(())
                }
            },
        };

        if let Err(e) = step {
            strategy.traversal().fail(e);
            break;
        }
    }
}
