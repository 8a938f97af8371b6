//! Output module: what a replication delivers to its consumer
//!
//! This module handles:
//! - The events a replication reports: members and side-channel notifications
//! - The backpressured member stream, which turns consumer pulls into
//!   demand for the scheduler

mod events;
mod stream;

pub use events::StreamEvent;
pub use stream::MemberStream;
