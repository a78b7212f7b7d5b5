//! Integration tests - run against an in-memory SQLite database
//!
//! These tests drive the public API end to end: registration, cached derived
//! tables, invalidation, pipeline execution modes and graph metrics.

mod fixtures;

mod cleanup_tests;
mod execution_mode_tests;
mod node_metrics_tests;
