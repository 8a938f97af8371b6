//! Fetcher module: one fetch-and-classify round per fragment
//!
//! This module contains:
//! - The dereferencer interface and its HTTP implementation
//! - Cache-Control classification into mutable and immutable fragments
//! - Reading relations and member references from a fetched graph

mod cache;
mod http;
mod ntriples;
mod relations;

pub use cache::{CacheDirective, Mutability};
pub use http::{build_http_client, HttpDereferencer};
pub use ntriples::parse_ntriples;
pub use relations::{extract_relations, group_relations, member_ids, RelationGroup};

use crate::condition::TimezonePolicy;
use crate::model::Triple;
use crate::FetchError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// A dereferenced fragment as delivered by a [`Dereferencer`]
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    /// URL after redirects
    pub final_url: String,

    /// The fragment's graph
    pub triples: Vec<Triple>,

    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
}

impl Fetched {
    /// Classifies the fragment from its `Cache-Control` header
    ///
    /// A fragment served without the header is mutable.
    pub fn mutability(&self) -> Mutability {
        self.headers
            .get("cache-control")
            .map(|value| CacheDirective::parse(value))
            .unwrap_or_default()
            .mutability()
    }
}

/// Turns a fragment URL into its graph
#[async_trait]
pub trait Dereferencer: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError>;
}

/// The outcome of one fetch-and-classify round
#[derive(Debug, Clone)]
pub struct Page {
    /// URL the fragment was requested under
    pub url: String,

    /// URL after redirects
    pub final_url: String,

    pub mutability: Mutability,

    /// Outgoing relations, merged per target
    pub relations: Vec<RelationGroup>,

    /// Members the fragment references
    pub members: Vec<String>,

    /// The graph, shared with extraction workers
    pub triples: Arc<Vec<Triple>>,
}

/// Fetches a fragment and classifies what it contains
///
/// # Arguments
///
/// * `dereferencer` - Source of fragment graphs
/// * `url` - Fragment to fetch
/// * `policy` - Timezone policy for reading relation values
pub async fn fetch_page(
    dereferencer: &dyn Dereferencer,
    url: &str,
    policy: TimezonePolicy,
) -> Result<Page, FetchError> {
    let fetched = dereferencer.fetch(url).await?;
    let mutability = fetched.mutability();

    let relations = group_relations(&extract_relations(&fetched.triples), policy);
    let members = member_ids(&fetched.triples);

    tracing::debug!(
        "Classified {} as {:?}: {} relation target(s), {} member(s)",
        url,
        mutability,
        relations.len(),
        members.len()
    );

    Ok(Page {
        url: url.to_string(),
        final_url: fetched.final_url,
        mutability,
        relations,
        members,
        triples: Arc::new(fetched.triples),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Term;
    use crate::vocab::tree;

    struct OnePage;

    #[async_trait]
    impl Dereferencer for OnePage {
        async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
            if url != "http://ex.org/root" {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            }
            let mut headers = HashMap::new();
            headers.insert("cache-control".to_string(), "max-age=30".to_string());
            Ok(Fetched {
                final_url: url.to_string(),
                triples: vec![
                    Triple::new(
                        Term::iri("http://ex.org/c"),
                        tree::MEMBER,
                        Term::iri("http://ex.org/m1"),
                    ),
                    Triple::new(
                        Term::iri("http://ex.org/c"),
                        tree::VIEW,
                        Term::iri("http://ex.org/next"),
                    ),
                ],
                headers,
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_page_classifies() {
        let page = fetch_page(&OnePage, "http://ex.org/root", TimezonePolicy::Utc)
            .await
            .unwrap();
        assert_eq!(page.mutability, Mutability::Mutable { max_age: Some(30) });
        assert_eq!(page.members, vec!["http://ex.org/m1"]);
        assert_eq!(page.relations.len(), 1);
        assert_eq!(page.relations[0].target, "http://ex.org/next");
        assert!(page.relations[0].open);
    }

    #[tokio::test]
    async fn test_fetch_page_propagates_errors() {
        let err = fetch_page(&OnePage, "http://ex.org/missing", TimezonePolicy::Utc)
            .await
            .unwrap_err();
        assert_eq!(err.url(), "http://ex.org/missing");
    }

    #[test]
    fn test_missing_header_is_mutable() {
        let fetched = Fetched::default();
        assert_eq!(fetched.mutability(), Mutability::Mutable { max_age: None });
    }
}
