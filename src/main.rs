//! ldes-tide main entry point
//!
//! This is the command-line interface for the ldes-tide stream replicator.

use anyhow::Context;
use clap::Parser;
use ldes_tide::config::load_config_with_hash;
use ldes_tide::extract::CbdExtractor;
use ldes_tide::fetcher::HttpDereferencer;
use ldes_tide::storage::{lock, open_storage};
use ldes_tide::{Replicator, StreamEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// ldes-tide: a resumable event stream replicator
///
/// ldes-tide follows a paginated event stream fragment by fragment and
/// writes its members to stdout as JSON lines, either as soon as they are
/// found or strictly ordered by timestamp. Interrupted runs resume where
/// they stopped.
#[derive(Parser, Debug)]
#[command(name = "ldes-tide")]
#[command(version)]
#[command(about = "A resumable event stream replicator", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh replication, discarding previous state
    #[arg(long)]
    fresh: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the members
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    let storage = open_storage(Path::new(&config.storage.database_path))
        .with_context(|| format!("failed to open {}", config.storage.database_path))?;

    if cli.fresh {
        tracing::info!("Starting fresh replication (discarding previous state)");
        lock(&storage)?.clear_all()?;
    } else {
        tracing::info!("Starting replication (will resume if previous state exists)");
    }

    let dereferencer = Arc::new(HttpDereferencer::new(&config.fetch)?);
    let replicator = Replicator::new(config, dereferencer, Arc::new(CbdExtractor), storage)?
        .with_config_hash(config_hash);

    let mut stream = replicator.start()?;

    let cancel = stream.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted; state is kept for the next run");
            cancel.cancel();
        }
    });

    let mut members = 0usize;
    let mut errors = 0usize;

    while let Some(event) = stream.next().await {
        match event {
            StreamEvent::Member(member) => {
                println!("{}", serde_json::to_string(&member)?);
                members += 1;
            }
            StreamEvent::FragmentFetched { .. } | StreamEvent::MutableRecorded { .. } => {
                tracing::debug!("{}", event);
            }
            StreamEvent::PollCycle { .. } => tracing::info!("{}", event),
            StreamEvent::Error(e) => {
                tracing::warn!("{}", e);
                errors += 1;
            }
            StreamEvent::Closed => break,
        }
    }

    tracing::info!("Replicated {} member(s), {} error(s)", members, errors);
    stream.shutdown().await?;

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("ldes_tide=info,warn"),
            1 => EnvFilter::new("ldes_tide=debug,info"),
            2 => EnvFilter::new("ldes_tide=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
