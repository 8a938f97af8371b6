//! Interrupting a replication and resuming it from the same database

use crate::common::*;
use ldes_tide::config::OrderingMode;
use ldes_tide::StreamEvent;
use ldes_tide::storage::{lock, shared, Partition, SharedStorage, SqliteStorage};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const P1: &str = "http://ex.org/p1";
const P2: &str = "http://ex.org/p2";

fn fragments() -> Vec<Fragment> {
    vec![
        Fragment::new(ROOT)
            .member("http://ex.org/d1", day(1))
            .member("http://ex.org/d2", day(2))
            .relation("GreaterThanOrEqualToRelation", P1, Some(day(3)))
            .relation("GreaterThanOrEqualToRelation", P2, Some(day(5))),
        Fragment::new(P1)
            .member("http://ex.org/d3", day(3))
            .member("http://ex.org/d4", day(4))
            .immutable(),
        Fragment::new(P2)
            .member("http://ex.org/d5", day(5))
            .member("http://ex.org/d6", day(6))
            .immutable(),
    ]
}

fn all_ids() -> HashSet<String> {
    (1..=6).map(|d| format!("http://ex.org/d{}", d)).collect()
}

fn open(path: &Path) -> SharedStorage {
    shared(SqliteStorage::new(path).unwrap())
}

fn emitted(storage: &SharedStorage) -> HashSet<String> {
    lock(storage)
        .unwrap()
        .iter(Partition::Emitted, "")
        .unwrap()
        .into_iter()
        .map(|(key, _)| key)
        .collect()
}

async fn resume_in(mode: OrderingMode) {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("state.db");

    // First run: take two members, then stop
    let storage = open(&db);
    let slow = StaticStream::slow(fragments(), Duration::from_millis(50));
    let mut stream = start(config(mode), slow, Arc::clone(&storage));

    let mut first = HashSet::new();
    while first.len() < 2 {
        let member = stream.next_member().await.expect("stream closed early");
        assert!(first.insert(member.id));
    }
    stream.shutdown().await.unwrap();

    let recorded = emitted(&storage);
    assert!(first.is_subset(&recorded));
    drop(storage);

    // Second run: the rest, exactly once
    let storage = open(&db);
    let mut stream = start(config(mode), StaticStream::new(fragments()), Arc::clone(&storage));
    let events = collect_events(&mut stream).await;
    let second = ids(&members(&events));

    let unique: HashSet<String> = second.iter().cloned().collect();
    assert_eq!(unique.len(), second.len(), "duplicates in {:?}", second);
    assert!(unique.is_disjoint(&recorded), "{:?} re-emitted", unique.intersection(&recorded));
    assert_eq!(unique.len() + recorded.len(), all_ids().len());
    assert_eq!(emitted(&storage), all_ids());
    drop(storage);

    // Third run: nothing left, immutable fragments stay untouched
    let storage = open(&db);
    let source = StaticStream::new(fragments());
    let mut stream = start(config(mode), Arc::clone(&source), storage);
    let events = collect_events(&mut stream).await;

    assert!(members(&events).is_empty());
    assert_eq!(source.fetch_count(P1), 0);
    assert_eq!(source.fetch_count(P2), 0);
}

#[tokio::test]
async fn test_resume_unordered() {
    resume_in(OrderingMode::None).await;
}

#[tokio::test]
async fn test_resume_ascending() {
    resume_in(OrderingMode::Ascending).await;
}

#[tokio::test]
async fn test_resume_keeps_buffered_members() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("state.db");

    // Descending order buffers everything until the traversal resolves;
    // stop as soon as the root is in, with its children still in flight
    let storage = open(&db);
    let slow = StaticStream::slow(fragments(), Duration::from_millis(50));
    let mut stream = start(config(OrderingMode::Descending), slow, Arc::clone(&storage));

    while let Some(event) = stream.next().await {
        if matches!(&event, StreamEvent::FragmentFetched { url, .. } if url == ROOT) {
            break;
        }
    }
    stream.shutdown().await.unwrap();

    let recorded = emitted(&storage);
    drop(storage);

    let storage = open(&db);
    let mut stream = start(config(OrderingMode::Descending), StaticStream::new(fragments()), storage);
    let events = collect_events(&mut stream).await;
    let second = ids(&members(&events));

    let expected: Vec<String> = (1..=6)
        .rev()
        .map(|d| format!("http://ex.org/d{}", d))
        .filter(|id| !recorded.contains(id))
        .collect();
    assert_eq!(second, expected);
}
