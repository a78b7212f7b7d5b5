use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::errors::{BackendError, ExecutorError};
use super::input_data::{Ingestion, InputData};
use super::{Backend, Row, TableHandle};
use crate::pipeline::{Pipeline, PipelineError};
use crate::sql::Dialect;
use crate::utils::table_naming::PhysicalTableName;

/// How a pipeline is run against the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Render the pipeline as one `WITH` query and materialize its result.
    #[default]
    Single,
    /// Materialize every statement as its own table, so a failure names the
    /// exact statement. Step tables are dropped afterwards.
    Stepwise,
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("Unknown execution mode '{0}' (expected 'single' or 'stepwise')")]
pub struct ParseExecutionModeError(String);

impl FromStr for ExecutionMode {
    type Err = ParseExecutionModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(ExecutionMode::Single),
            "stepwise" | "debug" => Ok(ExecutionMode::Stepwise),
            other => Err(ParseExecutionModeError(other.to_string())),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Single => f.write_str("single"),
            ExecutionMode::Stepwise => f.write_str("stepwise"),
        }
    }
}

/// Runs pipelines and registrations against one backend.
///
/// The executor knows nothing about caching: whoever calls [`Executor::submit`]
/// decides whether the table is needed at all and what it is called.
pub struct Executor {
    backend: Arc<dyn Backend>,
    mode: ExecutionMode,
}

impl Executor {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Executor {
            backend,
            mode: ExecutionMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn dialect(&self) -> Arc<dyn Dialect> {
        self.backend.dialect()
    }

    /// Run `pipeline` and materialize its final statement as `output`.
    ///
    /// Errors are reported against the statement that failed: the final
    /// statement in single mode, the exact step in stepwise mode.
    pub fn submit(
        &self,
        pipeline: &Pipeline,
        output: &PhysicalTableName,
    ) -> Result<TableHandle, ExecutorError> {
        let statement = pipeline.output_name().ok_or(PipelineError::EmptyPipeline)?;
        log::debug!(
            "Submitting pipeline '{}' ({} statements, {} mode) as {}",
            statement,
            pipeline.len(),
            self.mode,
            output
        );

        match self.mode {
            ExecutionMode::Single => {
                let sql = pipeline.render()?;
                self.materialize(statement, &sql, output.as_str())?;
            }
            ExecutionMode::Stepwise => {
                let mut step_tables = Vec::new();
                let result = self.run_steps(pipeline, output, &mut step_tables);
                for table in step_tables {
                    if let Err(e) = self.backend.drop_table(&table) {
                        log::warn!("Failed to drop step table {}: {}", table, e);
                    }
                }
                result?;
            }
        }

        Ok(TableHandle::new(output.clone(), Arc::clone(&self.backend)))
    }

    /// Run `pipeline` and return its rows without materializing anything.
    /// Only for pipelines whose output is small (counts, summaries).
    pub fn query(&self, pipeline: &Pipeline) -> Result<Vec<Row>, ExecutorError> {
        let statement = pipeline.output_name().ok_or(PipelineError::EmptyPipeline)?;
        let sql = pipeline.render()?;
        let translated = self
            .dialect()
            .translate(&sql)
            .map_err(|e| ExecutorError::in_statement(statement, e))?;
        log::debug!("Querying '{}':\n{}", statement, translated);
        self.backend
            .query_rows(&translated)
            .map_err(|e| ExecutorError::in_statement(statement, e))
    }

    fn run_steps(
        &self,
        pipeline: &Pipeline,
        output: &PhysicalTableName,
        step_tables: &mut Vec<String>,
    ) -> Result<(), ExecutorError> {
        let dialect = self.dialect();
        let step_table = |name: &str| format!("{}__{}", output.as_str(), name);
        let last = pipeline.len().saturating_sub(1);

        for (index, statement) in pipeline.statements().iter().enumerate() {
            let sql =
                pipeline.render_step(index, |name| dialect.quote_identifier(&step_table(name)))?;
            if index == last {
                self.materialize(&statement.output_name, &sql, output.as_str())?;
            } else {
                let table = step_table(&statement.output_name);
                self.materialize(&statement.output_name, &sql, &table)?;
                step_tables.push(table);
            }
        }
        Ok(())
    }

    fn materialize(&self, statement: &str, generic_sql: &str, table: &str) -> Result<(), ExecutorError> {
        let dialect = self.dialect();
        let translated = dialect
            .translate(generic_sql)
            .map_err(|e| ExecutorError::in_statement(statement, e))?;
        let create = dialect.create_table_as(&dialect.quote_identifier(table), &translated);
        log::debug!("Materializing '{}' as {}:\n{}", statement, table, create);
        self.backend
            .execute(&create)
            .map_err(|e| ExecutorError::in_statement(statement, e))
    }

    /// Create `physical` from externally supplied data without running a
    /// pipeline.
    ///
    /// Fails with [`ExecutorError::AlreadyExists`] if the table exists and
    /// `overwrite` is false. Input is validated before anything is dropped.
    pub fn register(
        &self,
        data: InputData,
        physical: &PhysicalTableName,
        overwrite: bool,
    ) -> Result<TableHandle, ExecutorError> {
        let name = physical.as_str();
        let exists = self.backend.table_exists(name)?;
        if exists && !overwrite {
            return Err(ExecutorError::AlreadyExists {
                table: name.to_string(),
            });
        }

        match data.into_ingestion()? {
            Ingestion::Load(records) => {
                if exists {
                    self.backend.drop_table(name)?;
                }
                self.backend
                    .create_table_from_records(name, &records.columns, &records.rows)?;
            }
            Ingestion::Copy(source) => {
                let same_backend =
                    std::ptr::addr_eq(Arc::as_ptr(source.backend()), Arc::as_ptr(&self.backend));
                if same_backend && source.physical_name().as_str() == name {
                    // Already in place: only the logical role changes
                    return Ok(TableHandle::new(physical.clone(), Arc::clone(&self.backend)));
                }
                if same_backend {
                    if exists {
                        self.backend.drop_table(name)?;
                    }
                    let sql = format!("SELECT * FROM {}", source.quoted_name());
                    self.materialize(physical.logical().as_str(), &sql, name)?;
                } else {
                    let columns = source.columns()?;
                    let rows = source
                        .rows()?
                        .into_iter()
                        .map(|row| {
                            columns
                                .iter()
                                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                                .collect()
                        })
                        .collect::<Vec<Vec<Value>>>();
                    if exists {
                        self.backend.drop_table(name)?;
                    }
                    self.backend.create_table_from_records(name, &columns, &rows)?;
                }
            }
        }

        log::info!("Registered table {} (logical '{}')", name, physical.logical());
        Ok(TableHandle::new(physical.clone(), Arc::clone(&self.backend)))
    }

    /// Drop every table whose name starts with `prefix`.
    ///
    /// Best effort: individual drop failures are logged and skipped. Returns
    /// the number of tables dropped.
    pub fn delete_by_prefix(&self, prefix: &str) -> Result<usize, BackendError> {
        let mut deleted = 0;
        for table in self.backend.list_tables()? {
            if !table.starts_with(prefix) {
                continue;
            }
            match self.backend.drop_table(&table) {
                Ok(()) => deleted += 1,
                Err(e) => log::warn!("Failed to drop table {}: {}", table, e),
            }
        }
        log::info!("Dropped {} tables with prefix '{}'", deleted, prefix);
        Ok(deleted)
    }
}
