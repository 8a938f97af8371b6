//! Unordered traversal
//!
//! Members are forwarded as soon as they are extracted. One counter tracks
//! the fragments scheduled but not finished across the whole traversal;
//! when it drops to zero the pass is over.

use super::{FetchSignal, Strategy, Traversal};
use crate::extract::ExtractionOutcome;
use crate::output::StreamEvent;
use crate::state::TraversalState;
use crate::Result;

pub(crate) struct UnorderedStrategy {
    traversal: Traversal,
    in_flight: usize,
}

impl UnorderedStrategy {
    pub(crate) fn new(traversal: Traversal) -> Self {
        Self {
            traversal,
            in_flight: 0,
        }
    }

    fn settle(&mut self, index: u64) -> Result<()> {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.traversal.finished(index)
    }

    fn check_end(&mut self) -> Result<()> {
        if self.in_flight > 0 || self.traversal.is_cancelled() || !self.traversal.is_running() {
            return Ok(());
        }
        self.traversal.poll_or_close()
    }
}

impl Strategy for UnorderedStrategy {
    fn traversal(&mut self) -> &mut Traversal {
        &mut self.traversal
    }

    fn start(&mut self) -> Result<()> {
        self.traversal.transition(TraversalState::Running)?;
        self.traversal.check_config_hash()?;

        for member in self.traversal.restore_unemitted()? {
            self.traversal.emit(member)?;
        }

        let (jobs, restored) = self.traversal.initial_jobs()?;
        self.in_flight += jobs.len();
        if !restored {
            self.traversal.schedule(jobs)?;
        }

        tracing::info!("Replicating without ordering");
        self.check_end()
    }

    fn on_fetched(&mut self, signal: FetchSignal) -> Result<()> {
        let FetchSignal { dispatch, result } = signal;

        match result {
            Err(error) => {
                tracing::warn!("Failed to fetch {}: {}", dispatch.item.fragment.url, error);
                self.settle(dispatch.index)?;
                self.traversal.send(StreamEvent::Error(error.into()));
            }
            Ok(page) => {
                self.traversal.record_page(&page)?;

                let children = self.traversal.discover(&dispatch.item, &page)?;
                self.in_flight += children.len();
                self.traversal.schedule(children)?;

                if self.traversal.start_extraction(&dispatch, &page)? == 0 {
                    self.settle(dispatch.index)?;
                }
            }
        }

        self.check_end()
    }

    fn on_extracted(&mut self, outcome: ExtractionOutcome) -> Result<()> {
        let (member, done) = self.traversal.complete_extraction(outcome)?;

        if let Some(member) = member {
            self.traversal.emit(member)?;
        }

        if let Some(fragment) = done {
            self.in_flight = self.in_flight.saturating_sub(1);
            self.traversal.finish_fragment(&fragment)?;
        }

        self.check_end()
    }

    fn on_poll(&mut self) -> Result<()> {
        let jobs = self.traversal.begin_poll_cycle()?;
        self.in_flight += jobs.len();
        self.traversal.schedule(jobs)?;
        self.check_end()
    }
}
