//! Shared fixtures: an in-memory stream served by a static dereferencer

use async_trait::async_trait;
use ldes_tide::config::{Config, OrderingMode};
use ldes_tide::extract::CbdExtractor;
use ldes_tide::fetcher::{Dereferencer, Fetched};
use ldes_tide::model::{Literal, Member, Term, Triple, Value};
use ldes_tide::storage::{shared, SharedStorage, SqliteStorage};
use ldes_tide::vocab::{tree, xsd, RDF_TYPE};
use ldes_tide::{FetchError, MemberStream, Replicator, StreamEvent, TimezonePolicy};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ROOT: &str = "http://ex.org/root";
pub const CREATED: &str = "http://purl.org/dc/terms/created";
pub const IS_VERSION_OF: &str = "http://purl.org/dc/terms/isVersionOf";

pub fn number(n: i64) -> Literal {
    Literal::typed(n.to_string(), "http://www.w3.org/2001/XMLSchema#integer")
}

pub fn day(d: u32) -> Literal {
    Literal::typed(format!("2024-01-{:02}T00:00:00Z", d), xsd::DATE_TIME)
}

/// One fragment of a test stream
#[derive(Debug, Clone)]
pub struct Fragment {
    pub url: String,
    triples: Vec<Triple>,
    cache_control: Option<String>,
    relations: usize,
}

impl Fragment {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            triples: Vec::new(),
            cache_control: None,
            relations: 0,
        }
    }

    /// Adds a member stamped with `created`
    pub fn member(mut self, id: &str, created: Literal) -> Self {
        self.triples
            .push(Triple::new(Term::iri(&self.url), tree::MEMBER, Term::iri(id)));
        self.triples
            .push(Triple::new(Term::iri(id), CREATED, Term::Literal(created)));
        self
    }

    /// Adds a member that is a version of `base`
    pub fn version(self, id: &str, base: &str, created: Literal) -> Self {
        let mut fragment = self.member(id, created);
        fragment
            .triples
            .push(Triple::new(Term::iri(id), IS_VERSION_OF, Term::iri(base)));
        fragment
    }

    /// Adds a relation without a value
    pub fn link(self, target: &str) -> Self {
        self.relation("Relation", target, None)
    }

    /// Adds a relation of type `tree:{kind}` over the created path
    pub fn relation(mut self, kind: &str, target: &str, value: Option<Literal>) -> Self {
        self.relations += 1;
        let node = Term::Blank(format!("r{}", self.relations));

        self.triples
            .push(Triple::new(Term::iri(&self.url), tree::RELATION, node.clone()));
        self.triples
            .push(Triple::new(node.clone(), RDF_TYPE, Term::iri(tree::iri(kind))));
        self.triples
            .push(Triple::new(node.clone(), tree::NODE, Term::iri(target)));
        if let Some(value) = value {
            self.triples
                .push(Triple::new(node.clone(), tree::VALUE, Term::Literal(value)));
            self.triples.push(Triple::new(node, tree::PATH, Term::iri(CREATED)));
        }
        self
    }

    pub fn immutable(mut self) -> Self {
        self.cache_control = Some("public, max-age=604800, immutable".to_string());
        self
    }

    pub fn max_age(mut self, seconds: u64) -> Self {
        self.cache_control = Some(format!("max-age={}", seconds));
        self
    }
}

/// Serves fragments from memory and logs every fetch
#[derive(Default)]
pub struct StaticStream {
    fragments: Mutex<HashMap<String, Fragment>>,
    fetches: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl StaticStream {
    pub fn new(fragments: Vec<Fragment>) -> Arc<Self> {
        Arc::new(Self::build(fragments, None))
    }

    /// Like `new`, but every fetch takes `delay`
    pub fn slow(fragments: Vec<Fragment>, delay: Duration) -> Arc<Self> {
        Arc::new(Self::build(fragments, Some(delay)))
    }

    fn build(fragments: Vec<Fragment>, delay: Option<Duration>) -> Self {
        Self {
            fragments: Mutex::new(fragments.into_iter().map(|f| (f.url.clone(), f)).collect()),
            fetches: Mutex::new(Vec::new()),
            delay,
        }
    }

    /// Replaces a fragment, as a server appending to it would
    pub fn replace(&self, fragment: Fragment) {
        self.fragments
            .lock()
            .unwrap()
            .insert(fragment.url.clone(), fragment);
    }

    pub fn fetches(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Dereferencer for StaticStream {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.fetches.lock().unwrap().push(url.to_string());

        let fragment = self.fragments.lock().unwrap().get(url).cloned();
        let Some(fragment) = fragment else {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            });
        };

        let mut headers = HashMap::new();
        if let Some(cache_control) = fragment.cache_control {
            headers.insert("cache-control".to_string(), cache_control);
        }

        Ok(Fetched {
            final_url: url.to_string(),
            triples: fragment.triples,
            headers,
        })
    }
}

/// Config for the test stream with members stamped on the created path
pub fn config(ordering: OrderingMode) -> Config {
    let mut config = Config::for_url(ROOT);
    config.stream.timestamp_path = Some(vec![CREATED.to_string()]);
    config.replication.ordering = ordering;
    config.replication.default_timezone = TimezonePolicy::Utc;
    config
}

pub fn memory_storage() -> SharedStorage {
    shared(SqliteStorage::in_memory().unwrap())
}

pub fn start(config: Config, stream: Arc<StaticStream>, storage: SharedStorage) -> MemberStream {
    Replicator::new(config, stream, Arc::new(CbdExtractor), storage)
        .unwrap()
        .start()
        .unwrap()
}

/// Pulls every event until the stream closes
pub async fn collect_events(stream: &mut MemberStream) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let collecting = async {
        while let Some(event) = stream.next().await {
            events.push(event);
        }
    };
    tokio::time::timeout(Duration::from_secs(10), collecting)
        .await
        .expect("stream did not close in time");
    events
}

pub fn members(events: &[StreamEvent]) -> Vec<&Member> {
    events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::Member(member) => Some(member),
            _ => None,
        })
        .collect()
}

pub fn ids(members: &[&Member]) -> Vec<String> {
    members.iter().map(|m| m.id.clone()).collect()
}

pub fn timestamps(members: &[&Member]) -> Vec<Value> {
    members.iter().filter_map(|m| m.timestamp.clone()).collect()
}
