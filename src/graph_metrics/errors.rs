use thiserror::Error;

use crate::backend::{BackendError, ExecutorError};
use crate::pipeline::PipelineError;

#[derive(Debug, Error)]
pub enum GraphMetricsError {
    #[error("Column '{column}' not found in table '{table}'")]
    MissingColumn { column: String, table: String },

    #[error("Threshold must be a finite number between 0 and 1, got {0}")]
    InvalidThreshold(f64),

    #[error(transparent)]
    Execution(#[from] ExecutorError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Invalid metrics pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Unexpected metrics row: {0}")]
    InvalidRow(#[from] serde_json::Error),
}
