//! End-to-end replication over in-memory streams

use crate::common::*;
use async_trait::async_trait;
use ldes_tide::config::OrderingMode;
use ldes_tide::extract::{CbdExtractor, Extractor};
use ldes_tide::model::{Triple, Value};
use ldes_tide::{ConfigError, ExtractError, FetchError, LdesError, Replicator, StreamEvent};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const A: &str = "http://ex.org/a";
const B: &str = "http://ex.org/b";
const C: &str = "http://ex.org/c";

/// R links to A plainly and to B with "greater than 3"
fn two_level_tree() -> Arc<StaticStream> {
    StaticStream::new(vec![
        Fragment::new(ROOT)
            .link(A)
            .relation("GreaterThanRelation", B, Some(number(3))),
        Fragment::new(A).member("http://ex.org/m2", number(2)),
        Fragment::new(B).member("http://ex.org/m3", number(3)),
    ])
}

fn numbers(events: &[StreamEvent]) -> Vec<f64> {
    timestamps(&members(events))
        .into_iter()
        .map(|value| match value {
            Value::Number(n) => n,
            other => panic!("unexpected timestamp {}", other),
        })
        .collect()
}

#[tokio::test]
async fn test_two_level_tree_ascending() {
    let mut stream = start(config(OrderingMode::Ascending), two_level_tree(), memory_storage());
    let events = collect_events(&mut stream).await;

    assert_eq!(numbers(&events), vec![2.0, 3.0]);
    assert!(matches!(events.last(), Some(StreamEvent::Closed)));
}

#[tokio::test]
async fn test_two_level_tree_descending() {
    let mut stream = start(config(OrderingMode::Descending), two_level_tree(), memory_storage());
    let events = collect_events(&mut stream).await;

    assert_eq!(numbers(&events), vec![3.0, 2.0]);
}

#[tokio::test]
async fn test_two_level_tree_unordered() {
    let mut stream = start(config(OrderingMode::None), two_level_tree(), memory_storage());
    let events = collect_events(&mut stream).await;

    let mut values = numbers(&events);
    assert_eq!(values.len(), 2);
    values.sort_by(f64::total_cmp);
    assert_eq!(values, vec![2.0, 3.0]);
}

/// Three levels of dated fragments with members spread over nine days
fn dated_tree() -> Arc<StaticStream> {
    const P1: &str = "http://ex.org/p1";
    const P2: &str = "http://ex.org/p2";
    const P3: &str = "http://ex.org/p3";

    StaticStream::new(vec![
        Fragment::new(ROOT)
            .member("http://ex.org/d2", day(2))
            .member("http://ex.org/d1", day(1))
            .relation("GreaterThanOrEqualToRelation", P2, Some(day(6)))
            .relation("GreaterThanOrEqualToRelation", P1, Some(day(3))),
        Fragment::new(P1)
            .member("http://ex.org/d5", day(5))
            .member("http://ex.org/d3", day(3))
            .member("http://ex.org/d4", day(4))
            .relation("GreaterThanOrEqualToRelation", P3, Some(day(8)))
            .immutable(),
        Fragment::new(P2)
            .member("http://ex.org/d7", day(7))
            .member("http://ex.org/d6", day(6))
            .immutable(),
        Fragment::new(P3)
            .member("http://ex.org/d9", day(9))
            .member("http://ex.org/d8", day(8))
            .immutable(),
    ])
}

#[tokio::test]
async fn test_dated_tree_is_emitted_in_order() {
    for (mode, expected) in [
        (OrderingMode::Ascending, (1..=9).collect::<Vec<u32>>()),
        (OrderingMode::Descending, (1..=9).rev().collect::<Vec<u32>>()),
    ] {
        let mut stream = start(config(mode), dated_tree(), memory_storage());
        let events = collect_events(&mut stream).await;

        let expected: Vec<String> = expected
            .into_iter()
            .map(|d| format!("http://ex.org/d{}", d))
            .collect();
        assert_eq!(ids(&members(&events)), expected, "{:?}", mode);
    }
}

#[tokio::test]
async fn test_ordering_violation_is_not_followed() {
    let stream = StaticStream::new(vec![
        Fragment::new(ROOT).relation("GreaterThanRelation", B, Some(number(3))),
        Fragment::new(B)
            .member("http://ex.org/m4", number(4))
            .relation("GreaterThanRelation", C, Some(number(1))),
        Fragment::new(C).member("http://ex.org/m2", number(2)),
    ]);

    let mut members_stream = start(
        config(OrderingMode::Ascending),
        Arc::clone(&stream),
        memory_storage(),
    );
    let events = collect_events(&mut members_stream).await;

    assert_eq!(ids(&members(&events)), vec!["http://ex.org/m4"]);
    assert_eq!(stream.fetch_count(C), 0);
}

#[tokio::test]
async fn test_fetch_error_does_not_stop_traversal() {
    for mode in [OrderingMode::None, OrderingMode::Ascending] {
        let stream = StaticStream::new(vec![
            Fragment::new(ROOT).link(A).link(B),
            Fragment::new(B).member("http://ex.org/m1", number(1)),
        ]);

        let mut members_stream = start(config(mode), stream, memory_storage());
        let events = collect_events(&mut members_stream).await;

        assert!(events.iter().any(|event| matches!(
            event,
            StreamEvent::Error(LdesError::Fetch(FetchError::Status { status: 404, url })) if url == A
        )));
        assert_eq!(ids(&members(&events)), vec!["http://ex.org/m1"]);
        assert!(matches!(events.last(), Some(StreamEvent::Closed)));
    }
}

#[tokio::test]
async fn test_condition_prunes_relations_and_members() {
    const OLD: &str = "http://ex.org/old";
    const NEW: &str = "http://ex.org/new";

    let stream = StaticStream::new(vec![
        Fragment::new(ROOT)
            .member("http://ex.org/d1", day(1))
            .relation("LessThanRelation", OLD, Some(day(5)))
            .relation("GreaterThanOrEqualToRelation", NEW, Some(day(5))),
        Fragment::new(OLD).member("http://ex.org/d2", day(2)),
        Fragment::new(NEW)
            .member("http://ex.org/d6", day(6))
            .member("http://ex.org/d7", day(7)),
    ]);

    let mut config = config(OrderingMode::Ascending);
    config.condition.after = Some("2024-01-05".to_string());

    let mut members_stream = start(config, Arc::clone(&stream), memory_storage());
    let events = collect_events(&mut members_stream).await;

    assert_eq!(
        ids(&members(&events)),
        vec!["http://ex.org/d6", "http://ex.org/d7"]
    );
    assert_eq!(stream.fetch_count(OLD), 0);
}

#[tokio::test]
async fn test_fragment_events() {
    let stream = StaticStream::new(vec![
        Fragment::new(ROOT)
            .member("http://ex.org/m1", number(1))
            .link(A)
            .max_age(60),
        Fragment::new(A).member("http://ex.org/m2", number(2)).immutable(),
    ]);

    let mut members_stream = start(config(OrderingMode::None), stream, memory_storage());
    let events = collect_events(&mut members_stream).await;

    assert!(events.iter().any(|event| matches!(
        event,
        StreamEvent::MutableRecorded { url, max_age: Some(60) } if url == ROOT
    )));
    assert!(events.iter().any(|event| matches!(
        event,
        StreamEvent::FragmentFetched { url, mutable: false, members: 1, .. } if url == A
    )));
    assert!(!events.iter().any(|event| matches!(
        event,
        StreamEvent::MutableRecorded { url, .. } if url == A
    )));
}

#[tokio::test]
async fn test_polling_refetches_mutable_fragments() {
    let stream = StaticStream::new(vec![
        Fragment::new(ROOT).member("http://ex.org/m1", number(1)).link(A),
        Fragment::new(A).member("http://ex.org/c1", number(0)).immutable(),
    ]);

    let mut config = config(OrderingMode::None);
    config.replication.polling = true;
    config.replication.poll_interval = 100;

    let mut members_stream = start(config, Arc::clone(&stream), memory_storage());
    let mut seen = HashSet::new();
    let mut cycles = 0;

    let collecting = async {
        while let Some(event) = members_stream.next().await {
            match event {
                StreamEvent::Member(member) => {
                    seen.insert(member.id);
                    if seen.len() == 2 {
                        stream.replace(
                            Fragment::new(ROOT)
                                .member("http://ex.org/m1", number(1))
                                .member("http://ex.org/m2", number(2))
                                .link(A),
                        );
                    }
                    if seen.len() == 3 {
                        break;
                    }
                }
                StreamEvent::PollCycle { .. } => cycles += 1,
                _ => {}
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), collecting)
        .await
        .expect("poll cycle did not deliver the new member");
    members_stream.shutdown().await.unwrap();

    assert!(seen.contains("http://ex.org/m2"));
    assert!(cycles >= 1);
    assert!(stream.fetch_count(ROOT) >= 2);
    assert_eq!(stream.fetch_count(A), 1);
}

#[tokio::test]
async fn test_cancel_ends_stream() {
    let stream = StaticStream::slow(
        vec![
            Fragment::new(ROOT).member("http://ex.org/m1", number(1)).link(A),
            Fragment::new(A).member("http://ex.org/m2", number(2)),
        ],
        Duration::from_millis(50),
    );

    let mut members_stream = start(config(OrderingMode::None), stream, memory_storage());
    let first = members_stream.next_member().await;
    assert!(first.is_some());

    members_stream.cancel();
    assert!(members_stream.is_cancelled());
    assert!(members_stream.next().await.is_none());
    members_stream.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_last_version_only_with_materialize() {
    let stream = StaticStream::new(vec![Fragment::new(ROOT)
        .version("http://ex.org/obj/v1", "http://ex.org/obj", day(1))
        .version("http://ex.org/obj2/v1", "http://ex.org/obj2", day(3))
        .version("http://ex.org/obj/v2", "http://ex.org/obj", day(2))]);

    let mut config = config(OrderingMode::None);
    config.stream.version_of_path = Some(vec![IS_VERSION_OF.to_string()]);
    config.replication.last_version_only = true;
    config.replication.materialize = true;

    let mut members_stream = start(config, stream, memory_storage());
    let events = collect_events(&mut members_stream).await;
    let emitted = members(&events);

    // Descending order: the newest version of each object arrives first
    assert_eq!(ids(&emitted), vec!["http://ex.org/obj2", "http://ex.org/obj"]);
    assert_eq!(
        emitted[1].timestamp,
        Some(Value::from_literal(&day(2)))
    );
    assert!(emitted
        .iter()
        .all(|m| m.facts.iter().all(|t| t.predicate != IS_VERSION_OF)));
}

#[tokio::test]
async fn test_ordering_requires_timestamp_path() {
    let mut config = config(OrderingMode::Ascending);
    config.stream.timestamp_path = None;

    let result = Replicator::new(
        config,
        StaticStream::new(vec![]),
        Arc::new(CbdExtractor),
        memory_storage(),
    );
    assert!(matches!(result, Err(ConfigError::MissingTimestampPath)));
}

/// Fails on one member and defers to CBD for the rest
struct RejectOne(&'static str);

#[async_trait]
impl Extractor for RejectOne {
    async fn extract(
        &self,
        graph: &[Triple],
        member_id: &str,
        shape: Option<&str>,
        extra: &[String],
    ) -> Result<Vec<Triple>, ExtractError> {
        if member_id == self.0 {
            return Err(ExtractError::Failed {
                member: member_id.to_string(),
                message: "rejected".to_string(),
            });
        }
        CbdExtractor.extract(graph, member_id, shape, extra).await
    }
}

#[tokio::test]
async fn test_extraction_failure_is_isolated() {
    let stream = StaticStream::new(vec![Fragment::new(ROOT)
        .member("http://ex.org/m1", number(1))
        .member("http://ex.org/bad", number(2))
        .member("http://ex.org/m3", number(3))]);

    let replicator = Replicator::new(
        config(OrderingMode::Ascending),
        stream,
        Arc::new(RejectOne("http://ex.org/bad")),
        memory_storage(),
    )
    .unwrap();
    let mut members_stream = replicator.start().unwrap();
    let events = collect_events(&mut members_stream).await;

    assert_eq!(
        ids(&members(&events)),
        vec!["http://ex.org/m1", "http://ex.org/m3"]
    );
    assert!(events.iter().any(|event| matches!(
        event,
        StreamEvent::Error(LdesError::Extract(ExtractError::Failed { member, .. }))
            if member == "http://ex.org/bad"
    )));
}
