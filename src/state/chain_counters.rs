use std::collections::HashMap;

/// Outstanding work of one relation chain
///
/// A chain is resolved only when both counts are zero: its fragment has been
/// fetched and every extraction pass over it has finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainCounters {
    /// Fetches scheduled or running for the chain's fragment
    pub in_flight: u32,

    /// Member-extraction passes running over the chain's fragment
    pub extracting: u32,
}

impl ChainCounters {
    /// Returns true if the chain can no longer yield members
    pub fn is_resolved(&self) -> bool {
        self.in_flight == 0 && self.extracting == 0
    }
}

/// Counters for every launched chain, keyed by the chain's target
#[derive(Debug, Default)]
pub struct CounterTable {
    counters: HashMap<String, ChainCounters>,
}

impl CounterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a fetch scheduled for `target`
    pub fn launch(&mut self, target: &str) {
        self.counters.entry(target.to_string()).or_default().in_flight += 1;
    }

    /// Records that the fetch of `target` completed, successfully or not
    pub fn fetched(&mut self, target: &str) {
        if let Some(c) = self.counters.get_mut(target) {
            c.in_flight = c.in_flight.saturating_sub(1);
        }
    }

    /// Records an extraction pass starting over `target`
    pub fn extraction_started(&mut self, target: &str) {
        self.counters.entry(target.to_string()).or_default().extracting += 1;
    }

    /// Records an extraction pass over `target` finishing
    pub fn extraction_finished(&mut self, target: &str) {
        if let Some(c) = self.counters.get_mut(target) {
            c.extracting = c.extracting.saturating_sub(1);
        }
    }

    /// Returns the counters of `target`; unknown chains are resolved
    pub fn get(&self, target: &str) -> ChainCounters {
        self.counters.get(target).copied().unwrap_or_default()
    }

    /// Returns true if `target` has no outstanding work
    pub fn is_resolved(&self, target: &str) -> bool {
        self.get(target).is_resolved()
    }

    /// Forgets a resolved chain
    pub fn remove(&mut self, target: &str) {
        if self.is_resolved(target) {
            self.counters.remove(target);
        }
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}
