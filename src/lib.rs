//! linkgraph - run-scoped table cache and graph metrics for record linkage
//!
//! This crate sits between a record-linkage pipeline and the SQL engine that
//! does the heavy lifting:
//! - Pipelines of named SQL statements rendered into a single `WITH` query
//! - An intermediate table cache keyed by logical table name, invalidated by
//!   bumping a run epoch
//! - Registration of externally supplied data as named tables
//! - Cluster and node graph metrics computed as push-down aggregations

pub mod utils;

pub mod backend;
pub mod cache;
pub mod config;
pub mod graph_metrics;
pub mod pipeline;
pub mod sql;
pub mod table_management;

pub use backend::{Backend, Executor, ExecutionMode, InputData, Row, TableHandle};
pub use cache::IntermediateTableCache;
pub use graph_metrics::GraphColumns;
pub use pipeline::Pipeline;
pub use sql::ColumnIdentifier;
pub use table_management::TableManager;
pub use utils::table_naming::{LogicalTableName, PhysicalTableName, RunToken};
