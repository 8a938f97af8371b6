//! State module for tracking traversal progress
//!
//! # Components
//!
//! - `TraversalState`: lifecycle of one strategy (idle, running, draining, polling, closed)
//! - `ChainCounters`: per-chain in-flight and extracting counts gating ordered emission

mod chain_counters;
mod lifecycle;

pub use chain_counters::{ChainCounters, CounterTable};
pub use lifecycle::TraversalState;
