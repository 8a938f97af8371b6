//! Ordered traversal
//!
//! Members are emitted strictly in timestamp order. The strategy keeps
//! every launched chain in a heap ordered by [`RelationChain::ordering`],
//! buffers extracted members in a heap ordered by timestamp, and counts the
//! outstanding fetches and extraction passes of each chain.
//!
//! A buffered member is released once nothing that is still unresolved
//! could yield a member before it:
//! - while the lowest chain is unimportant, nothing is released
//! - when the lowest chain carries an important bound, every member strictly
//!   before the bound is released
//! - once every chain is resolved, the rest is flushed in order

use super::{FetchSignal, FragmentJob, Strategy, Traversal};
use crate::chain::{Direction, RelationChain};
use crate::extract::ExtractionOutcome;
use crate::model::{Member, Value};
use crate::output::StreamEvent;
use crate::scheduler::{Comparator, PriorityHeap};
use crate::state::{CounterTable, TraversalState};
use crate::Result;
use std::cmp::Ordering;
use std::sync::Arc;

pub(crate) struct OrderedStrategy {
    traversal: Traversal,
    direction: Direction,
    chains: PriorityHeap<RelationChain>,
    members: PriorityHeap<Member>,
    counters: CounterTable,
}

/// Member order: untimestamped members first, then by timestamp in emission order
pub(crate) fn member_order(direction: Direction) -> Comparator<Member> {
    Arc::new(move |a: &Member, b: &Member| match (&a.timestamp, &b.timestamp) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => direction.compare(x, y),
    })
}

fn chain_order() -> Comparator<RelationChain> {
    Arc::new(|a: &RelationChain, b: &RelationChain| a.ordering(b))
}

impl OrderedStrategy {
    pub(crate) fn new(traversal: Traversal, direction: Direction) -> Self {
        Self {
            traversal,
            direction,
            chains: PriorityHeap::new(chain_order()),
            members: PriorityHeap::new(member_order(direction)),
            counters: CounterTable::new(),
        }
    }

    /// Tracks newly launched chains
    fn launch(&mut self, jobs: &[FragmentJob]) {
        for job in jobs {
            self.counters.launch(&job.fragment.url);
            self.chains.push(job.chain.clone());
        }
    }

    /// Emits what the launched chains allow, then checks for the end of the pass
    fn check_emit(&mut self) -> Result<()> {
        if self.traversal.is_cancelled() || !self.traversal.is_running() {
            return Ok(());
        }

        loop {
            let Some(head) = self.chains.peek().cloned() else {
                return self.check_end();
            };

            if let Some(bound) = head
                .head()
                .filter(|marker| marker.important)
                .and_then(|marker| marker.value.clone())
            {
                self.release_before(&bound)?;
            }

            let blocked = self.chains.iter().any(|chain| {
                self.chains.compare(chain, &head) == Ordering::Equal
                    && !self.counters.is_resolved(&chain.target)
            });
            if blocked {
                return Ok(());
            }

            self.chains.pop();
            self.counters.remove(&head.target);
        }
    }

    /// Emits every buffered member strictly before `bound`
    fn release_before(&mut self, bound: &Value) -> Result<()> {
        while let Some(next) = self.members.peek() {
            let ready = match &next.timestamp {
                None => true,
                Some(timestamp) => self.direction.precedes(timestamp, bound),
            };
            if !ready {
                break;
            }
            if let Some(member) = self.members.pop() {
                self.traversal.emit(member)?;
            }
        }
        Ok(())
    }

    /// Flushes the buffer once every chain resolved
    fn check_end(&mut self) -> Result<()> {
        self.traversal.transition(TraversalState::Draining)?;

        let remaining = self.members.drain_sorted();
        if !remaining.is_empty() {
            tracing::debug!("Flushing {} buffered member(s)", remaining.len());
        }
        for member in remaining {
            self.traversal.emit(member)?;
        }

        self.traversal.poll_or_close()
    }
}

impl Strategy for OrderedStrategy {
    fn traversal(&mut self) -> &mut Traversal {
        &mut self.traversal
    }

    fn start(&mut self) -> Result<()> {
        self.traversal.transition(TraversalState::Running)?;
        self.traversal.check_config_hash()?;

        for member in self.traversal.restore_unemitted()? {
            self.members.push(member);
        }

        let (jobs, restored) = self.traversal.initial_jobs()?;
        self.launch(&jobs);
        if !restored {
            self.traversal.schedule(jobs)?;
        }

        tracing::info!("Replicating in {} order", self.direction);
        self.check_emit()
    }

    fn on_fetched(&mut self, signal: FetchSignal) -> Result<()> {
        let FetchSignal { dispatch, result } = signal;
        let target = dispatch.item.fragment.url.clone();

        match result {
            Err(error) => {
                tracing::warn!("Failed to fetch {}: {}", target, error);
                self.counters.fetched(&target);
                self.traversal.finished(dispatch.index)?;
                self.traversal.send(StreamEvent::Error(error.into()));
            }
            Ok(page) => {
                self.traversal.record_page(&page)?;

                let mut accepted = Vec::new();
                for child in self.traversal.discover(&dispatch.item, &page)? {
                    if child.chain.ordering(&dispatch.item.chain) == Ordering::Less {
                        tracing::warn!(
                            "Ordering violation: relation {} -> {} sorts before the path that found it; not following",
                            target,
                            child.fragment.url
                        );
                        continue;
                    }
                    accepted.push(child);
                }
                self.launch(&accepted);
                self.traversal.schedule(accepted)?;

                let started = self.traversal.start_extraction(&dispatch, &page)?;
                self.counters.fetched(&target);
                if started > 0 {
                    self.counters.extraction_started(&target);
                } else {
                    self.traversal.finished(dispatch.index)?;
                }
            }
        }

        self.check_emit()
    }

    fn on_extracted(&mut self, outcome: ExtractionOutcome) -> Result<()> {
        let (member, done) = self.traversal.complete_extraction(outcome)?;

        if let Some(member) = member {
            self.traversal.buffer(&member)?;
            self.members.push(member);
        }

        if let Some(fragment) = done {
            self.counters.extraction_finished(&fragment);
            self.traversal.finish_fragment(&fragment)?;
        }

        self.check_emit()
    }

    fn on_poll(&mut self) -> Result<()> {
        let jobs = self.traversal.begin_poll_cycle()?;
        self.launch(&jobs);
        self.traversal.schedule(jobs)?;
        self.check_emit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamped(id: &str, t: f64) -> Member {
        Member::new(id, vec![]).with_timestamp(Value::Number(t))
    }

    fn drain_ids(direction: Direction) -> Vec<String> {
        let mut heap = PriorityHeap::new(member_order(direction));
        heap.push(stamped("b", 2.0));
        heap.push(Member::new("untimed", vec![]));
        heap.push(stamped("c", 3.0));
        heap.push(stamped("a", 1.0));
        heap.drain_sorted().into_iter().map(|m| m.id).collect()
    }

    #[test]
    fn test_member_order_ascending() {
        assert_eq!(drain_ids(Direction::Ascending), vec!["untimed", "a", "b", "c"]);
    }

    #[test]
    fn test_member_order_descending() {
        assert_eq!(drain_ids(Direction::Descending), vec!["untimed", "c", "b", "a"]);
    }

    #[test]
    fn test_chain_order_drains_unimportant_first() {
        let root = RelationChain::root("http://ex.org/r", Direction::Ascending);
        let late = root.push("http://ex.org/b", crate::chain::Marker::important(Value::Number(3.0)));
        let early = root.push("http://ex.org/c", crate::chain::Marker::important(Value::Number(1.0)));
        let plain = root.push("http://ex.org/a", crate::chain::Marker::unimportant());

        let mut heap = PriorityHeap::new(chain_order());
        heap.push(late);
        heap.push(early);
        heap.push(plain);

        let order: Vec<String> = heap.drain_sorted().into_iter().map(|c| c.target).collect();
        assert_eq!(order, vec!["http://ex.org/a", "http://ex.org/c", "http://ex.org/b"]);
    }
}
