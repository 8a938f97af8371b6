//! Integration tests for ldes-tide

mod common;
mod http;
mod replication;
mod resume;
