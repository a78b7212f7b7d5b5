use thiserror::Error;

use crate::pipeline::PipelineError;
use crate::sql::DialectError;

/// Failures raised by a concrete engine.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    #[error("Invalid input records: {0}")]
    InvalidRecords(String),

    #[error("SQL translation failed: {0}")]
    Translation(#[from] DialectError),
}

/// Failures of the execution contract layered over a backend.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Table '{table}' already exists (pass overwrite=true to replace it)")]
    AlreadyExists { table: String },

    #[error("Error executing statement '{statement}': {source}")]
    BackendExecution {
        statement: String,
        #[source]
        source: BackendError,
    },

    #[error("Invalid pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ExecutorError {
    /// Attach the name of the statement that was running when `source` failed.
    pub fn in_statement(statement: impl Into<String>, source: impl Into<BackendError>) -> Self {
        ExecutorError::BackendExecution {
            statement: statement.into(),
            source: source.into(),
        }
    }

    /// Name of the failing statement, when known.
    pub fn statement(&self) -> Option<&str> {
        match self {
            ExecutorError::BackendExecution { statement, .. } => Some(statement),
            _ => None,
        }
    }
}
