use thiserror::Error;

use crate::backend::{BackendError, ExecutorError};
use crate::graph_metrics::GraphMetricsError;
use crate::pipeline::PipelineError;
use crate::utils::table_naming::TableNameError;

#[derive(Debug, Error)]
pub enum TableManagementError {
    #[error("Column '{column}' not found in {table}")]
    MissingColumn { column: String, table: String },

    #[error("No input tables configured")]
    NoInputTables,

    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(#[from] TableNameError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Invalid pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    GraphMetrics(#[from] GraphMetricsError),
}
