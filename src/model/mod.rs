//! Data model shared by every stage of the replicator
//!
//! # Components
//!
//! - `Term`, `Literal`, `Triple`: the facts carried by fetched fragments and members
//! - `Value`: a comparable relation or timestamp value
//! - `FragmentRef`, `Relation`: references to fragments and the typed edges between them
//! - `Member`: one extracted record of the stream

mod fragment;
mod member;
mod term;
mod value;

pub use fragment::{FragmentRef, Relation, RelationKind};
pub use member::Member;
pub use term::{Literal, Term, Triple};
pub use value::Value;
