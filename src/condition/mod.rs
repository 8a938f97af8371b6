//! Condition engine
//!
//! This module decides which fragments are worth following and which members
//! are delivered:
//! - Ranges: value intervals derived from relations
//! - Partial date/time parsing under a timezone policy
//! - Condition trees evaluated against ranges and members

mod datetime;
mod range;
mod tree;

pub use datetime::{is_exact_instant, parse_instant, parse_partial, TimezonePolicy};
pub use range::Range;
pub use tree::{Condition, Leaf};
