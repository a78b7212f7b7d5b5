//! Unit tests - no database required
//!
//! SQL generation, dialect translation and configuration loading.

mod config_yaml_tests;
mod metrics_sql_tests;
