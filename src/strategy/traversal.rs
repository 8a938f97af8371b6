//! The traversal core shared by both strategies
//!
//! This module handles:
//! - Seeding and resuming: the root, recorded mutable fragments, restored jobs
//! - Dispatching admitted fragment fetches onto tasks
//! - Classifying fetched pages and discovering the relations worth following
//! - Handing pages to the member coordinator and booking its outcomes
//! - Emitting members: dedup, latest-version check, materialization, demand
//! - Lifecycle moves: poll timer, close, cancellation, structural failure

use super::FragmentJob;
use crate::chain::{Direction, Marker, RelationChain};
use crate::condition::{Condition, TimezonePolicy};
use crate::extract::{ExtractionOutcome, MemberBuilder, MemberCoordinator};
use crate::fetcher::{fetch_page, Dereferencer, Mutability, Page};
use crate::model::{FragmentRef, Member};
use crate::output::StreamEvent;
use crate::scheduler::{Dispatch, Modulator, Scheduler};
use crate::state::TraversalState;
use crate::{FetchError, LdesError, Result};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Meta key under which the hash of the configuration is kept
const CONFIG_HASH_KEY: &str = "config-hash";

/// Settings a traversal runs with, resolved from the configuration
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub root: String,
    pub direction: Option<Direction>,

    /// Relation path whose bounds order the traversal
    pub ordering_path: Option<String>,

    pub policy: TimezonePolicy,
    pub condition: Condition,
    pub poll_interval: Option<Duration>,
    pub last_version_only: bool,
    pub materialize: bool,
    pub config_hash: Option<String>,
}

/// A fetch finished by a dispatch task
pub(crate) struct FetchSignal {
    pub dispatch: Dispatch<FragmentJob>,
    pub result: std::result::Result<Page, FetchError>,
}

/// Everything the event driver listens to
pub(crate) struct Inbox {
    pub fetched: mpsc::UnboundedReceiver<FetchSignal>,
    pub extracted: mpsc::UnboundedReceiver<ExtractionOutcome>,
    pub poll: mpsc::UnboundedReceiver<()>,
    pub demand: mpsc::UnboundedReceiver<()>,
}

pub(crate) struct Traversal {
    settings: Settings,
    modulator: Modulator,
    scheduler: Scheduler<FragmentJob>,
    dereferencer: Arc<dyn Dereferencer>,
    coordinator: MemberCoordinator,
    builder: Arc<MemberBuilder>,
    events: mpsc::UnboundedSender<StreamEvent>,
    fetched: mpsc::UnboundedSender<FetchSignal>,
    poll: mpsc::UnboundedSender<()>,
    cancel: CancellationToken,
    state: TraversalState,

    /// Targets scheduled during the current pass
    visited: HashSet<String>,

    /// Scheduler index of every fragment whose members are being extracted
    extracting: HashMap<String, u64>,

    /// Members the consumer asked for and has not received
    demand: usize,

    poll_armed: bool,
    cycle: u64,
}

impl Traversal {
    /// Wires a traversal to its collaborators
    ///
    /// # Returns
    ///
    /// The traversal and the inbox its event driver listens to
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        settings: Settings,
        modulator: Modulator,
        scheduler: Scheduler<FragmentJob>,
        dereferencer: Arc<dyn Dereferencer>,
        coordinator: MemberCoordinator,
        builder: Arc<MemberBuilder>,
        events: mpsc::UnboundedSender<StreamEvent>,
        extracted: mpsc::UnboundedReceiver<ExtractionOutcome>,
        demand: mpsc::UnboundedReceiver<()>,
        cancel: CancellationToken,
    ) -> (Self, Inbox) {
        let (fetched_tx, fetched_rx) = mpsc::unbounded_channel();
        let (poll_tx, poll_rx) = mpsc::unbounded_channel();

        let traversal = Self {
            settings,
            modulator,
            scheduler,
            dereferencer,
            coordinator,
            builder,
            events,
            fetched: fetched_tx,
            poll: poll_tx,
            cancel,
            state: TraversalState::Idle,
            visited: HashSet::new(),
            extracting: HashMap::new(),
            demand: 0,
            poll_armed: false,
            cycle: 0,
        };

        let inbox = Inbox {
            fetched: fetched_rx,
            extracted,
            poll: poll_rx,
            demand,
        };

        (traversal, inbox)
    }

    pub fn state(&self) -> TraversalState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == TraversalState::Running
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Moves the lifecycle forward
    pub fn transition(&mut self, next: TraversalState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(LdesError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!("Traversal {} -> {}", self.state, next);
        self.state = next;
        Ok(())
    }

    /// Delivers an event unless the traversal was cancelled
    pub fn send(&self, event: StreamEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        // The consumer may have gone away; cancellation follows
        let _ = self.events.send(event);
    }

    /// Records the configuration hash, warning when it changed since the last run
    pub fn check_config_hash(&self) -> Result<()> {
        let Some(hash) = &self.settings.config_hash else {
            return Ok(());
        };

        if let Some(previous) = self.modulator.meta(CONFIG_HASH_KEY)? {
            if &previous != hash {
                tracing::warn!(
                    "Configuration changed since the stored replication state was written; resuming with the new one"
                );
            }
        }
        self.modulator.set_meta(CONFIG_HASH_KEY, hash)?;
        Ok(())
    }

    /// Members buffered but not emitted by an interrupted run
    ///
    /// They are marked seen so that refetched fragments do not extract them again.
    pub fn restore_unemitted(&mut self) -> Result<Vec<Member>> {
        let members = self.modulator.unemitted()?;
        if !members.is_empty() {
            tracing::info!("Restoring {} buffered member(s)", members.len());
        }
        for member in &members {
            self.coordinator.mark_seen(&member.id);
        }
        Ok(members)
    }

    /// The jobs a traversal starts from
    ///
    /// Jobs left pending by an interrupted run are resumed as they are.
    /// Otherwise the root is seeded, together with every fragment a
    /// previous run recorded as mutable.
    ///
    /// # Returns
    ///
    /// The jobs, and whether they are already scheduled
    pub fn initial_jobs(&mut self) -> Result<(Vec<FragmentJob>, bool)> {
        if self.scheduler.restored() > 0 {
            let jobs: Vec<FragmentJob> = self.scheduler.pending_items().cloned().collect();
            tracing::info!("Resuming {} pending fragment(s)", jobs.len());
            for job in &jobs {
                self.visited.insert(job.fragment.url.clone());
            }
            return Ok((jobs, true));
        }

        let root = FragmentJob::root(&self.settings.root, self.direction());
        let mut jobs = vec![root];
        for job in self.mutable_jobs()? {
            if job.fragment.url != self.settings.root {
                jobs.push(job);
            }
        }
        tracing::info!(
            "Starting from {} with {} known mutable fragment(s)",
            self.settings.root,
            jobs.len() - 1
        );
        Ok((jobs, false))
    }

    fn direction(&self) -> Direction {
        self.settings.direction.unwrap_or(Direction::Ascending)
    }

    fn mutable_jobs(&self) -> Result<Vec<FragmentJob>> {
        let direction = self.direction();
        Ok(self
            .modulator
            .mutable_fragments()?
            .into_iter()
            .map(|fragment| FragmentJob {
                chain: RelationChain::root(fragment.url.clone(), direction),
                fragment,
            })
            .collect())
    }

    /// Schedules fragment fetches and dispatches whatever is admitted
    pub fn schedule(&mut self, jobs: Vec<FragmentJob>) -> Result<()> {
        if jobs.is_empty() {
            return Ok(());
        }
        for job in &jobs {
            self.visited.insert(job.fragment.url.clone());
        }
        let ready = self.scheduler.push(jobs)?;
        self.dispatch(ready);
        Ok(())
    }

    /// Completes a fragment job and dispatches whatever its slot admits
    pub fn finished(&mut self, index: u64) -> Result<()> {
        let ready = self.scheduler.finished(index)?;
        self.dispatch(ready);
        Ok(())
    }

    /// Books one unit of consumer demand
    pub fn on_demand(&mut self) -> Result<()> {
        self.demand += 1;
        self.modulator.unpause();
        let ready = self.scheduler.check_ready()?;
        self.dispatch(ready);
        Ok(())
    }

    fn dispatch(&self, ready: Vec<Dispatch<FragmentJob>>) {
        for dispatch in ready {
            let dereferencer = Arc::clone(&self.dereferencer);
            let fetched = self.fetched.clone();
            let policy = self.settings.policy;

            tracing::debug!(
                "Fetching {} (job {}, {} in flight, {} pending)",
                dispatch.item.fragment.url,
                dispatch.index,
                self.scheduler.in_flight(),
                self.scheduler.pending()
            );
            tokio::spawn(async move {
                let url = dispatch.item.fragment.url.clone();
                let result = fetch_page(dereferencer.as_ref(), &url, policy).await;
                let _ = fetched.send(FetchSignal { dispatch, result });
            });
        }
    }

    /// Records a fetched fragment's mutability and reports the fetch
    pub fn record_page(&mut self, page: &Page) -> Result<()> {
        match page.mutability {
            Mutability::Immutable => self.modulator.record_immutable(&page.url)?,
            Mutability::Mutable { max_age } => {
                if self.modulator.record_mutable(&page.url, max_age)? {
                    self.send(StreamEvent::MutableRecorded {
                        url: page.url.clone(),
                        max_age,
                    });
                }
            }
        }

        self.send(StreamEvent::FragmentFetched {
            url: page.url.clone(),
            final_url: page.final_url.clone(),
            mutable: !page.mutability.is_immutable(),
            members: page.members.len(),
            relations: page.relations.len(),
        });
        Ok(())
    }

    /// The fragments worth following from a fetched page
    ///
    /// Targets the page's fragment expects, targets already scheduled this
    /// pass and targets recorded immutable are skipped, as are targets whose
    /// promised ranges cannot satisfy the condition.
    pub fn discover(&self, job: &FragmentJob, page: &Page) -> Result<Vec<FragmentJob>> {
        let mut children = Vec::new();

        for group in &page.relations {
            let target = &group.target;
            if job.fragment.expects(target) || self.visited.contains(target) {
                continue;
            }
            if self.modulator.is_immutable(target)? {
                tracing::debug!("Not refetching immutable fragment {}", target);
                continue;
            }
            if !group.is_allowed_by(&self.settings.condition) {
                tracing::debug!("Pruned {}: its range cannot match the condition", target);
                continue;
            }

            let marker = match (&self.settings.ordering_path, self.settings.direction) {
                (Some(path), Some(direction)) => Marker::for_range(group.range_on(path), direction),
                _ => Marker::unimportant(),
            };

            children.push(FragmentJob {
                fragment: FragmentRef::new(target.clone()).expecting(job.fragment.url.clone()),
                chain: job.chain.push(target.clone(), marker),
            });
        }

        Ok(children)
    }

    /// Hands a page's members to the coordinator
    ///
    /// Members already emitted or filtered out by an earlier pass are skipped.
    ///
    /// # Returns
    ///
    /// The number of extractions started; when zero the fragment is done
    pub fn start_extraction(&mut self, dispatch: &Dispatch<FragmentJob>, page: &Page) -> Result<usize> {
        let mut ids = Vec::new();
        for id in &page.members {
            if self.coordinator.is_seen(id) {
                continue;
            }
            if self.modulator.was_emitted(id)? || self.modulator.was_filtered(id)? {
                self.coordinator.mark_seen(id);
                continue;
            }
            ids.push(id.clone());
        }

        let started = self
            .coordinator
            .handle_page(&page.url, Arc::clone(&page.triples), ids);
        if started > 0 {
            self.extracting.insert(page.url.clone(), dispatch.index);
        }
        Ok(started)
    }

    /// Books an extraction outcome
    ///
    /// Failures are reported; members rejected by the condition are recorded
    /// as filtered.
    ///
    /// # Returns
    ///
    /// The accepted member, if any, and the fragment if it has no
    /// extraction left
    pub fn complete_extraction(
        &mut self,
        outcome: ExtractionOutcome,
    ) -> Result<(Option<Member>, Option<String>)> {
        let done = self.coordinator.complete(&outcome);
        let fragment = outcome.fragment().to_string();

        let member = match outcome {
            ExtractionOutcome::Failed {
                member_id, error, ..
            } => {
                tracing::warn!("Failed to extract {} from {}: {}", member_id, fragment, error);
                self.send(StreamEvent::Error(error.into()));
                None
            }
            ExtractionOutcome::Extracted { member, .. } => {
                if self
                    .settings
                    .condition
                    .match_member(&member, self.settings.policy)
                {
                    Some(member)
                } else {
                    tracing::debug!("Member {} does not match the condition", member.id);
                    self.modulator.record_filtered(&member.id)?;
                    None
                }
            }
        };

        Ok((member, done.then_some(fragment)))
    }

    /// Completes the job of a fragment whose extraction finished
    pub fn finish_fragment(&mut self, fragment: &str) -> Result<()> {
        match self.extracting.remove(fragment) {
            Some(index) => self.finished(index),
            None => Ok(()),
        }
    }

    /// Persists a member held back for ordering
    pub fn buffer(&self, member: &Member) -> Result<()> {
        self.modulator.record_unemitted(member)?;
        Ok(())
    }

    /// Delivers a member to the consumer
    ///
    /// With `last-version-only`, a member no newer than the latest version
    /// already emitted for its logical identity is dropped instead.
    ///
    /// # Returns
    ///
    /// `true` if the member was delivered
    pub fn emit(&mut self, member: Member) -> Result<bool> {
        if self.is_cancelled() {
            return Ok(false);
        }

        let id = member.id.clone();
        if self.modulator.was_emitted(&id)? {
            self.modulator.remove_unemitted(&id)?;
            return Ok(false);
        }

        if self.settings.last_version_only {
            if let Some(timestamp) = &member.timestamp {
                let base = member.base_id().to_string();
                let superseded = self
                    .modulator
                    .latest_version(&base)?
                    .map_or(false, |latest| latest.total_cmp(timestamp) != Ordering::Less);

                if superseded {
                    tracing::debug!("Dropping {}: a newer version of {} was emitted", id, base);
                    self.modulator.record_filtered(&id)?;
                    self.modulator.remove_unemitted(&id)?;
                    return Ok(false);
                }
                self.modulator.set_latest_version(&base, timestamp)?;
            }
        }

        let member = if self.settings.materialize {
            self.builder.materialize(member)
        } else {
            member
        };

        self.modulator.record_emitted(&id)?;
        self.modulator.remove_unemitted(&id)?;
        tracing::debug!("Emitting {}", id);
        self.send(StreamEvent::Member(member));

        self.demand = self.demand.saturating_sub(1);
        if self.demand == 0 {
            self.modulator.pause();
        }
        Ok(true)
    }

    /// Ends a pass: waits for the next poll cycle, or closes the stream
    pub fn poll_or_close(&mut self) -> Result<()> {
        if self.is_cancelled() {
            return Ok(());
        }

        match self.settings.poll_interval {
            Some(interval) => {
                self.transition(TraversalState::Polling)?;
                self.arm_poll(interval);
                Ok(())
            }
            None => self.close(),
        }
    }

    fn arm_poll(&mut self, interval: Duration) {
        if self.poll_armed {
            return;
        }
        self.poll_armed = true;
        tracing::debug!("Next poll cycle in {:?}", interval);

        let poll = self.poll.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let _ = poll.send(());
                }
                _ = cancel.cancelled() => {}
            }
        });
    }

    /// Starts a poll cycle
    ///
    /// # Returns
    ///
    /// The recorded mutable fragments, to be refetched
    pub fn begin_poll_cycle(&mut self) -> Result<Vec<FragmentJob>> {
        self.poll_armed = false;
        if self.is_cancelled() || self.state != TraversalState::Polling {
            return Ok(Vec::new());
        }

        self.transition(TraversalState::Running)?;
        self.cycle += 1;
        self.visited.clear();

        let jobs = self.mutable_jobs()?;
        tracing::info!("Poll cycle {}: refetching {} mutable fragment(s)", self.cycle, jobs.len());
        self.send(StreamEvent::PollCycle {
            cycle: self.cycle,
            fragments: jobs.len(),
        });
        Ok(jobs)
    }

    /// Closes the stream after a completed traversal
    pub fn close(&mut self) -> Result<()> {
        self.transition(TraversalState::Closed)?;
        tracing::info!("Replication of {} complete", self.settings.root);
        self.send(StreamEvent::Closed);
        Ok(())
    }

    /// Stops after cancellation; no further events are delivered
    pub fn cancelled(&mut self) {
        if !self.is_closed() {
            tracing::info!("Replication of {} cancelled", self.settings.root);
            self.state = TraversalState::Closed;
        }
    }

    /// Reports a structural failure once and closes the stream
    pub fn fail(&mut self, error: LdesError) {
        tracing::error!("Replication of {} failed: {}", self.settings.root, error);
        self.send(StreamEvent::Error(error));
        if !self.is_closed() {
            self.state = TraversalState::Closed;
            self.send(StreamEvent::Closed);
        }
    }
}
