use super::{drive, FragmentJob, OrderedStrategy, Settings, Traversal, UnorderedStrategy};
use crate::condition::Condition;
use crate::config::{validate, Config};
use crate::extract::{Extractor, MemberBuilder, MemberCoordinator};
use crate::fetcher::Dereferencer;
use crate::output::MemberStream;
use crate::scheduler::{Comparator, Modulator};
use crate::storage::SharedStorage;
use crate::{ConfigResult, Result};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Name of the scheduler holding fragment jobs
const FRAGMENTS: &str = "fragments";

/// Entry point: replicates one stream into a member stream
///
/// # Example
///
/// ```no_run
/// use ldes_tide::extract::CbdExtractor;
/// use ldes_tide::fetcher::HttpDereferencer;
/// use ldes_tide::storage::{shared, SqliteStorage};
/// use ldes_tide::{Config, Replicator};
/// use std::sync::Arc;
///
/// # async fn run() -> ldes_tide::Result<()> {
/// let config = Config::for_url("https://example.org/stream");
/// let dereferencer = Arc::new(HttpDereferencer::new(&config.fetch)?);
/// let storage = shared(SqliteStorage::in_memory()?);
///
/// let replicator = Replicator::new(config, dereferencer, Arc::new(CbdExtractor), storage)?;
/// let mut stream = replicator.start()?;
/// while let Some(member) = stream.next_member().await {
///     println!("{}", member.id);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Replicator {
    config: Config,
    condition: Condition,
    dereferencer: Arc<dyn Dereferencer>,
    extractor: Arc<dyn Extractor>,
    storage: SharedStorage,
    config_hash: Option<String>,
}

impl Replicator {
    /// Creates a replicator, validating the configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Replicator)` - Ready to start
    /// * `Err(ConfigError)` - Invalid configuration, e.g. ordering requested
    ///   without a timestamp path
    pub fn new(
        config: Config,
        dereferencer: Arc<dyn Dereferencer>,
        extractor: Arc<dyn Extractor>,
        storage: SharedStorage,
    ) -> ConfigResult<Self> {
        validate(&config)?;
        let condition = config.condition()?;

        Ok(Self {
            config,
            condition,
            dereferencer,
            extractor,
            storage,
            config_hash: None,
        })
    }

    /// Sets the configuration hash stored alongside the replication state
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Starts replicating on the current tokio runtime
    ///
    /// The replication resumes from whatever state the storage holds.
    /// Nothing is fetched until the stream is first pulled.
    pub fn start(self) -> Result<MemberStream> {
        let replication = &self.config.replication;
        let direction = self.config.direction();

        let modulator = Modulator::new(Arc::clone(&self.storage), replication.concurrency);
        modulator.pause();

        let order: Comparator<FragmentJob> = match direction {
            Some(_) => Arc::new(|a: &FragmentJob, b: &FragmentJob| a.chain.ordering(&b.chain)),
            None => Arc::new(|_: &FragmentJob, _: &FragmentJob| Ordering::Equal),
        };
        let scheduler = modulator.create(FRAGMENTS, order)?;

        let stream = &self.config.stream;
        let builder = Arc::new(MemberBuilder {
            timestamp_path: stream.timestamp_path.clone(),
            version_of_path: stream.version_of_path.clone(),
            last_of_transaction_path: stream.last_of_transaction_path.clone(),
            policy: replication.default_timezone,
        });

        let settings = Settings {
            root: stream.url.clone(),
            direction,
            ordering_path: stream
                .timestamp_path
                .as_ref()
                .filter(|path| path.len() == 1)
                .map(|path| path[0].clone()),
            policy: replication.default_timezone,
            condition: self.condition,
            poll_interval: replication
                .polling
                .then(|| Duration::from_millis(replication.poll_interval)),
            last_version_only: replication.last_version_only,
            materialize: replication.materialize,
            config_hash: self.config_hash,
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (demand_tx, demand_rx) = mpsc::unbounded_channel();
        let (extracted_tx, extracted_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let coordinator = MemberCoordinator::new(
            self.extractor,
            Arc::clone(&builder),
            stream.shape.clone(),
            replication.extraction_workers,
            extracted_tx,
        );

        let (traversal, inbox) = Traversal::new(
            settings,
            modulator,
            scheduler,
            self.dereferencer,
            coordinator,
            builder,
            events_tx,
            extracted_rx,
            demand_rx,
            cancel.clone(),
        );

        let task = match direction {
            Some(direction) => tokio::spawn(drive(
                OrderedStrategy::new(traversal, direction),
                inbox,
                cancel.clone(),
            )),
            None => tokio::spawn(drive(UnorderedStrategy::new(traversal), inbox, cancel.clone())),
        };

        Ok(MemberStream::new(events_rx, demand_tx, cancel, task))
    }
}
