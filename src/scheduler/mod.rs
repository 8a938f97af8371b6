//! Scheduling of fragment jobs
//!
//! This module handles:
//! - The modulator: shared concurrency bound, global pause, durable sets
//! - Named schedulers persisting their jobs through pending/in-flight partitions
//! - A binary heap ordered by an injected comparator

mod heap;
mod modulator;
mod queue;

pub use heap::{Comparator, PriorityHeap};
pub use modulator::Modulator;
pub use queue::{Dispatch, Scheduler};
