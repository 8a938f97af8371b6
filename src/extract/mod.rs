//! Member extraction
//!
//! This module contains:
//! - The extractor interface and a concise-bounded-description default
//! - Member metadata derivation and materialization
//! - The member coordinator running extraction on a bounded pool

mod builder;
mod cbd;
mod coordinator;

pub use builder::MemberBuilder;
pub use cbd::CbdExtractor;
pub use coordinator::{ExtractionOutcome, MemberCoordinator};

use crate::model::Triple;
use crate::ExtractError;
use async_trait::async_trait;

/// Selects the facts that make up one member
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Extracts the member's facts from a fragment's graph
    ///
    /// # Arguments
    ///
    /// * `graph` - Every triple of the fragment
    /// * `member_id` - The member to extract
    /// * `shape` - Optional shape describing the member's structure
    /// * `extra` - Further node identifiers to include
    async fn extract(
        &self,
        graph: &[Triple],
        member_id: &str,
        shape: Option<&str>,
        extra: &[String],
    ) -> Result<Vec<Triple>, ExtractError>;
}
