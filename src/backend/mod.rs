//! Execution backends and the handles they produce
//!
//! [`Backend`] is the engine boundary: run SQL, read rows, list/drop tables,
//! load records. [`Executor`] layers the pipeline execution contract on top
//! (translation, materialization, error enrichment, registration, cleanup).
//! [`TableHandle`] is the only way the rest of the crate refers to a
//! materialized table.

pub mod errors;
pub mod executor;
pub mod input_data;
pub mod sqlite;

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

pub use errors::{BackendError, ExecutorError};
pub use executor::{ExecutionMode, Executor};
pub use input_data::{InputData, Records};
pub use sqlite::SqliteBackend;

use crate::sql::{ColumnIdentifier, Dialect};
use crate::utils::table_naming::{LogicalTableName, PhysicalTableName};

/// A result row keyed by column name, in column order.
pub type Row = serde_json::Map<String, Value>;

/// A SQL engine able to materialize and read tables.
///
/// Table names passed in are raw (unquoted); implementations quote them with
/// their own [`Dialect`]. SQL text passed to [`Backend::execute`] and
/// [`Backend::query_rows`] is already in the backend's dialect.
pub trait Backend: Send + Sync {
    fn dialect(&self) -> Arc<dyn Dialect>;

    fn execute(&self, sql: &str) -> Result<(), BackendError>;

    fn query_rows(&self, sql: &str) -> Result<Vec<Row>, BackendError>;

    /// Column names of `table` in declaration order.
    fn table_columns(&self, table: &str) -> Result<Vec<String>, BackendError>;

    fn table_exists(&self, table: &str) -> Result<bool, BackendError>;

    fn list_tables(&self) -> Result<Vec<String>, BackendError>;

    fn drop_table(&self, table: &str) -> Result<(), BackendError>;

    /// Create `table` with `columns` and insert `rows` (each as long as
    /// `columns`).
    fn create_table_from_records(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<(), BackendError>;
}

/// A materialized table: its logical role, its physical name and read access
/// through the backend that holds it.
#[derive(Clone)]
pub struct TableHandle {
    physical: PhysicalTableName,
    backend: Arc<dyn Backend>,
}

impl TableHandle {
    pub(crate) fn new(physical: PhysicalTableName, backend: Arc<dyn Backend>) -> Self {
        TableHandle { physical, backend }
    }

    pub fn logical_name(&self) -> &LogicalTableName {
        self.physical.logical()
    }

    pub fn physical_name(&self) -> &PhysicalTableName {
        &self.physical
    }

    /// Physical name quoted for use in SQL against this handle's backend.
    pub fn quoted_name(&self) -> String {
        self.backend
            .dialect()
            .quote_identifier(self.physical.as_str())
    }

    pub fn columns(&self) -> Result<Vec<String>, BackendError> {
        self.backend.table_columns(self.physical.as_str())
    }

    pub fn has_column(&self, column: &ColumnIdentifier) -> Result<bool, BackendError> {
        Ok(self
            .columns()?
            .iter()
            .any(|c| c.eq_ignore_ascii_case(column.name())))
    }

    /// Read every row. Meant for small outputs (metrics, lookups), not for
    /// edge lists.
    pub fn rows(&self) -> Result<Vec<Row>, BackendError> {
        self.backend
            .query_rows(&format!("SELECT * FROM {}", self.quoted_name()))
    }

    pub fn row_count(&self) -> Result<u64, BackendError> {
        let rows = self
            .backend
            .query_rows(&format!("SELECT COUNT(*) AS n FROM {}", self.quoted_name()))?;
        Ok(rows
            .first()
            .and_then(|row| row.get("n"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    pub fn exists(&self) -> Result<bool, BackendError> {
        self.backend.table_exists(self.physical.as_str())
    }

    pub fn drop_table(&self) -> Result<(), BackendError> {
        self.backend.drop_table(self.physical.as_str())
    }

    /// Whether both handles point at the same physical table.
    pub fn same_table(&self, other: &TableHandle) -> bool {
        self.physical.as_str() == other.physical.as_str()
    }

    pub(crate) fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }
}

impl fmt::Debug for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableHandle")
            .field("logical", &self.physical.logical().as_str())
            .field("physical", &self.physical.as_str())
            .field("dialect", &self.backend.dialect().name())
            .finish()
    }
}
