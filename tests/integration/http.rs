//! HTTP dereferencing against a mock server
//!
//! These tests use wiremock to serve N-Triples fragments and check retry
//! handling, error classification and a full replication over HTTP.

use crate::common::{collect_events, ids, members, CREATED};
use ldes_tide::config::{Config, FetchConfig, OrderingMode};
use ldes_tide::extract::CbdExtractor;
use ldes_tide::fetcher::{Dereferencer, HttpDereferencer, Mutability};
use ldes_tide::storage::{shared, SqliteStorage};
use ldes_tide::{FetchError, Replicator, TimezonePolicy};
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NTRIPLES: &str = "application/n-triples";

fn fetch_config() -> FetchConfig {
    FetchConfig {
        max_retries: 3,
        retry_delay: 10,
        user_agent: "ldes-tide-test/1.0".to_string(),
        timeout: 5,
        ..FetchConfig::default()
    }
}

fn dereferencer() -> HttpDereferencer {
    HttpDereferencer::new(&fetch_config()).expect("Failed to build client")
}

/// A fragment holding one member, optionally related to a next page
fn page(base: &str, name: &str, member: &str, created: &str, next: Option<(&str, &str)>) -> String {
    let url = format!("{}/{}", base, name);
    let mut body = format!(
        "<{url}> <https://w3id.org/tree#member> <http://ex.org/{member}> .\n\
         <http://ex.org/{member}> <{CREATED}> \"{created}\"^^<http://www.w3.org/2001/XMLSchema#dateTime> .\n"
    );

    if let Some((target, value)) = next {
        body.push_str(&format!(
            "<{url}> <https://w3id.org/tree#relation> _:r .\n\
             _:r <http://www.w3.org/1999/02/22-rdf-syntax-ns#type> <https://w3id.org/tree#GreaterThanOrEqualToRelation> .\n\
             _:r <https://w3id.org/tree#node> <{base}/{target}> .\n\
             _:r <https://w3id.org/tree#path> <{CREATED}> .\n\
             _:r <https://w3id.org/tree#value> \"{value}\"^^<http://www.w3.org/2001/XMLSchema#dateTime> .\n"
        ));
    }
    body
}

#[tokio::test]
async fn test_fetch_parses_ntriples_and_headers() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/root"))
        .and(header("accept", NTRIPLES))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Cache-Control", "max-age=30")
                .set_body_raw(
                    page(&base, "root", "m1", "2024-01-01T00:00:00Z", None),
                    NTRIPLES,
                ),
        )
        .mount(&mock_server)
        .await;

    let fetched = dereferencer()
        .fetch(&format!("{}/root", base))
        .await
        .expect("Fetch should succeed");

    assert_eq!(fetched.triples.len(), 2);
    assert_eq!(
        fetched.headers.get("cache-control").map(String::as_str),
        Some("max-age=30")
    );
    assert_eq!(fetched.mutability(), Mutability::Mutable { max_age: Some(30) });
}

#[tokio::test]
async fn test_fetch_retries_transient_status() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    // First two requests fail, the third succeeds
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            page(&base, "flaky", "m1", "2024-01-01T00:00:00Z", None),
            NTRIPLES,
        ))
        .mount(&mock_server)
        .await;

    let fetched = dereferencer()
        .fetch(&format!("{}/flaky", base))
        .await
        .expect("Fetch should succeed after retries");

    assert_eq!(fetched.triples.len(), 2);
    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
}

#[tokio::test]
async fn test_fetch_gives_up_after_max_retries() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/down"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let config = FetchConfig {
        max_retries: 1,
        ..fetch_config()
    };
    let result = HttpDereferencer::new(&config)
        .unwrap()
        .fetch(&format!("{}/down", mock_server.uri()))
        .await;

    assert!(matches!(result, Err(FetchError::Unavailable { .. })));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_fetch_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let result = dereferencer()
        .fetch(&format!("{}/missing", mock_server.uri()))
        .await;

    assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_fetch_malformed_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("this is not a triple"))
        .mount(&mock_server)
        .await;

    let result = dereferencer()
        .fetch(&format!("{}/broken", mock_server.uri()))
        .await;

    assert!(matches!(result, Err(FetchError::Parse { .. })));
}

#[tokio::test]
async fn test_replicate_over_http() {
    let mock_server = MockServer::start().await;
    let base = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/root"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            page(
                &base,
                "root",
                "m2",
                "2024-01-02T00:00:00Z",
                Some(("next", "2024-01-03T00:00:00Z")),
            ),
            NTRIPLES,
        ))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Cache-Control", "public, max-age=604800, immutable")
                .set_body_raw(
                    page(&base, "next", "m3", "2024-01-03T00:00:00Z", None),
                    NTRIPLES,
                ),
        )
        .mount(&mock_server)
        .await;

    let mut config = Config::for_url(format!("{}/root", base));
    config.stream.timestamp_path = Some(vec![CREATED.to_string()]);
    config.replication.ordering = OrderingMode::Descending;
    config.replication.default_timezone = TimezonePolicy::Utc;
    config.fetch = fetch_config();

    let replicator = Replicator::new(
        config,
        Arc::new(dereferencer()),
        Arc::new(CbdExtractor),
        shared(SqliteStorage::in_memory().unwrap()),
    )
    .expect("Valid configuration");
    let mut stream = replicator.start().unwrap();
    let events = collect_events(&mut stream).await;

    assert_eq!(
        ids(&members(&events)),
        vec!["http://ex.org/m3", "http://ex.org/m2"]
    );
}
