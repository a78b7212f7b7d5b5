//! Caller-facing table management
//!
//! [`TableManager`] ties the cache, the executor and the input settings
//! together. Derived tables (`df_concat_with_tf`, `df_tf_<column>`) are
//! requested by logical name and computed at most once per run; graph
//! metrics are one-off outputs named uniquely under the current run.

pub mod errors;

use std::sync::Arc;

pub use errors::TableManagementError;

use crate::backend::{Executor, InputData, SqliteBackend, TableHandle};
use crate::cache::IntermediateTableCache;
use crate::config::LinkerConfig;
use crate::graph_metrics::{GraphColumns, GraphMetricsEngine};
use crate::pipeline::Pipeline;
use crate::sql::ColumnIdentifier;
use crate::utils::table_naming::{LogicalTableName, PhysicalTableName, TABLE_PREFIX};

/// An input table and the alias written to the source dataset column.
#[derive(Debug, Clone)]
pub struct InputTable {
    pub handle: TableHandle,
    pub alias: String,
}

/// Cluster and node metrics computed together.
#[derive(Debug, Clone)]
pub struct GraphMetricsTables {
    pub clusters: TableHandle,
    pub nodes: TableHandle,
}

pub struct TableManager {
    executor: Arc<Executor>,
    cache: IntermediateTableCache,
    input_tables: Vec<InputTable>,
    unique_id_column: ColumnIdentifier,
    source_dataset_column: ColumnIdentifier,
    graph_columns: GraphColumns,
}

impl TableManager {
    pub fn new(executor: Arc<Executor>) -> Self {
        let unique_id_column = ColumnIdentifier::new("unique_id");
        TableManager {
            cache: IntermediateTableCache::new(Arc::clone(&executor)),
            executor,
            input_tables: Vec::new(),
            graph_columns: GraphColumns::from_unique_id(&unique_id_column),
            unique_id_column,
            source_dataset_column: ColumnIdentifier::new("source_dataset"),
        }
    }

    /// Open the configured SQLite database and register the configured
    /// input tables.
    pub fn from_config(config: &LinkerConfig) -> Result<Self, TableManagementError> {
        let backend = match &config.database_path {
            Some(path) => SqliteBackend::open(path)?,
            None => SqliteBackend::in_memory()?,
        };
        let executor =
            Executor::new(Arc::new(backend)).with_mode(config.effective_execution_mode());

        let mut manager = TableManager::new(Arc::new(executor))
            .with_unique_id_column(config.unique_id())
            .with_source_dataset_column(config.source_dataset())
            .with_graph_columns(config.graph_columns());
        for (table, alias) in config.input_tables_with_aliases() {
            manager.add_input_table(&table, &alias)?;
        }
        Ok(manager)
    }

    pub fn with_unique_id_column(mut self, column: ColumnIdentifier) -> Self {
        self.unique_id_column = column;
        self
    }

    pub fn with_source_dataset_column(mut self, column: ColumnIdentifier) -> Self {
        self.source_dataset_column = column;
        self
    }

    pub fn with_graph_columns(mut self, columns: GraphColumns) -> Self {
        self.graph_columns = columns;
        self
    }

    /// Add an existing table as an input to `df_concat`.
    pub fn add_input_table(&mut self, table: &str, alias: &str) -> Result<(), TableManagementError> {
        let handle = self.table(table)?;
        log::debug!("Input table {} as '{}'", table, alias);
        self.input_tables.push(InputTable {
            handle,
            alias: alias.to_string(),
        });
        Ok(())
    }

    pub fn input_tables(&self) -> &[InputTable] {
        &self.input_tables
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn cache(&self) -> &IntermediateTableCache {
        &self.cache
    }

    pub fn graph_columns(&self) -> &GraphColumns {
        &self.graph_columns
    }

    /// Handle to an existing table, by its exact name.
    pub fn table(&self, name: &str) -> Result<TableHandle, TableManagementError> {
        let physical = PhysicalTableName::verbatim(LogicalTableName::new(name)?);
        if !self.executor.backend().table_exists(physical.as_str())? {
            return Err(TableManagementError::TableNotFound(name.to_string()));
        }
        Ok(TableHandle::new(physical, Arc::clone(self.executor.backend())))
    }

    /// Cached handle for `logical`, or compute it with `build`.
    pub fn get_or_compute<F, E>(&self, logical: &LogicalTableName, build: F) -> Result<TableHandle, E>
    where
        F: FnOnce(&PhysicalTableName) -> Result<TableHandle, E>,
    {
        self.cache.get_or_compute(logical, build)
    }

    pub fn invalidate_cache(&self) {
        self.cache.invalidate_all();
    }

    // ---- Registration ----

    /// Register `data` under `name` exactly. Not cached and not scoped to the
    /// run, so it survives invalidation.
    pub fn register_table(
        &self,
        data: InputData,
        name: &str,
        overwrite: bool,
    ) -> Result<TableHandle, TableManagementError> {
        let physical = PhysicalTableName::verbatim(LogicalTableName::new(name)?);
        Ok(self.executor.register(data, &physical, overwrite)?)
    }

    pub fn register_table_input_nodes_concat_with_tf(
        &self,
        data: InputData,
        overwrite: bool,
    ) -> Result<TableHandle, TableManagementError> {
        Ok(self
            .cache
            .register(&LogicalTableName::concat_with_tf(), data, overwrite)?)
    }

    pub fn register_table_predict(
        &self,
        data: InputData,
        overwrite: bool,
    ) -> Result<TableHandle, TableManagementError> {
        Ok(self
            .cache
            .register(&LogicalTableName::predict(), data, overwrite)?)
    }

    /// Register a precomputed term frequency table for `column`. The data
    /// must have both `column` and `tf_<column>`.
    pub fn register_term_frequency_lookup(
        &self,
        data: InputData,
        column: &ColumnIdentifier,
        overwrite: bool,
    ) -> Result<TableHandle, TableManagementError> {
        let logical = LogicalTableName::term_frequencies(column);
        let available = data.column_names()?;
        for required in [column.clone(), column.tf_name()] {
            if !contains_column(&available, &required) {
                return Err(TableManagementError::MissingColumn {
                    column: required.name().to_string(),
                    table: format!("term frequency lookup '{}'", logical),
                });
            }
        }
        Ok(self.cache.register(&logical, data, overwrite)?)
    }

    /// Register cluster labels under a fresh name in the current run. Labels
    /// are not cached: every call creates a new table.
    pub fn register_labels_table(
        &self,
        data: InputData,
        overwrite: bool,
    ) -> Result<TableHandle, TableManagementError> {
        let physical = PhysicalTableName::unique(&LogicalTableName::labels(), &self.cache.run_token());
        Ok(self.executor.register(data, &physical, overwrite)?)
    }

    /// Drop every table this crate created, in any run, and empty the cache.
    pub fn delete_tables_created_by_core(&self) -> Result<usize, TableManagementError> {
        self.cache.invalidate_all();
        Ok(self.executor.delete_by_prefix(TABLE_PREFIX)?)
    }

    // ---- Derived tables ----

    /// Add the `df_concat` statement to `pipeline`.
    ///
    /// Reads from the cached `df_concat_with_tf` (or `df_concat`) when there
    /// is one. Otherwise concatenates the input tables, tagging each row with
    /// its table's alias unless the table already has a source dataset
    /// column. Columns missing from a table are filled with NULL.
    pub fn enqueue_df_concat(&self, pipeline: &mut Pipeline) -> Result<(), TableManagementError> {
        let output = LogicalTableName::concat();
        for cached in [LogicalTableName::concat_with_tf(), LogicalTableName::concat()] {
            if !self.cache.contains(&cached) {
                continue;
            }
            if let Some(handle) = self.cache.get(&cached) {
                pipeline.enqueue_sql(
                    format!("SELECT * FROM {}", handle.quoted_name()),
                    output.as_str(),
                )?;
                return Ok(());
            }
        }

        pipeline.enqueue_sql(self.concat_inputs_sql()?, output.as_str())?;
        Ok(())
    }

    fn concat_inputs_sql(&self) -> Result<String, TableManagementError> {
        if self.input_tables.is_empty() {
            return Err(TableManagementError::NoInputTables);
        }
        let dialect = self.executor.dialect();
        let source_dataset = &self.source_dataset_column;

        let mut table_columns = Vec::with_capacity(self.input_tables.len());
        let mut all_columns: Vec<String> = Vec::new();
        for input in &self.input_tables {
            let columns = input.handle.columns()?;
            if !contains_column(&columns, &self.unique_id_column) {
                return Err(TableManagementError::MissingColumn {
                    column: self.unique_id_column.name().to_string(),
                    table: input.handle.physical_name().to_string(),
                });
            }
            for column in &columns {
                if column.eq_ignore_ascii_case(source_dataset.name())
                    || all_columns.iter().any(|c| c.eq_ignore_ascii_case(column))
                {
                    continue;
                }
                all_columns.push(column.clone());
            }
            table_columns.push(columns);
        }

        let selects: Vec<String> = self
            .input_tables
            .iter()
            .zip(&table_columns)
            .map(|(input, columns)| {
                let dataset = if contains_column(columns, source_dataset) {
                    source_dataset.qualified("t", dialect.as_ref())
                } else {
                    dialect.string_literal(&input.alias)
                };
                let mut items = vec![format!("{} AS {}", dataset, source_dataset.quoted(dialect.as_ref()))];
                for column in &all_columns {
                    let quoted = dialect.quote_identifier(column);
                    if columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                        items.push(format!("t.{} AS {}", quoted, quoted));
                    } else {
                        items.push(format!("NULL AS {}", quoted));
                    }
                }
                format!("SELECT {}\nFROM {} AS t", items.join(", "), input.handle.quoted_name())
            })
            .collect();
        Ok(selects.join("\nUNION ALL\n"))
    }

    /// Columns `df_concat` will have.
    fn concat_columns(&self) -> Result<Vec<String>, TableManagementError> {
        for cached in [LogicalTableName::concat_with_tf(), LogicalTableName::concat()] {
            if !self.cache.contains(&cached) {
                continue;
            }
            if let Some(handle) = self.cache.get(&cached) {
                return Ok(handle.columns()?);
            }
        }
        if self.input_tables.is_empty() {
            return Err(TableManagementError::NoInputTables);
        }
        let mut columns = vec![self.source_dataset_column.name().to_string()];
        for input in &self.input_tables {
            columns.extend(input.handle.columns()?);
        }
        Ok(columns)
    }

    /// Term frequencies of `column`: one row per distinct non-null value
    /// with `tf_<column>` = occurrences / non-null values.
    pub fn compute_tf_table(&self, column: &ColumnIdentifier) -> Result<TableHandle, TableManagementError> {
        let logical = LogicalTableName::term_frequencies(column);
        self.cache.get_or_compute(&logical, |physical| {
            if !contains_column(&self.concat_columns()?, column) {
                return Err(TableManagementError::MissingColumn {
                    column: column.name().to_string(),
                    table: LogicalTableName::concat().to_string(),
                });
            }

            let dialect = self.executor.dialect();
            let value = column.quoted(dialect.as_ref());
            let concat = LogicalTableName::concat();
            let sql = format!(
                "SELECT {value}, CAST(COUNT(*) AS DOUBLE) / (SELECT COUNT({value}) FROM {concat}) AS {tf}\n\
                 FROM {concat}\n\
                 WHERE {value} IS NOT NULL\n\
                 GROUP BY {value}",
                value = value,
                concat = concat,
                tf = column.tf_name().quoted(dialect.as_ref())
            );

            let mut pipeline = Pipeline::new();
            self.enqueue_df_concat(&mut pipeline)?;
            pipeline.enqueue_sql(sql, logical.as_str())?;
            Ok(self.executor.submit(&pipeline, physical)?)
        })
    }

    /// `df_concat` with a `tf_<column>` column for every column in `columns`,
    /// joined from the (cached) term frequency tables.
    pub fn compute_df_concat_with_tf(
        &self,
        columns: &[ColumnIdentifier],
    ) -> Result<TableHandle, TableManagementError> {
        let logical = LogicalTableName::concat_with_tf();
        self.cache.get_or_compute(&logical, |physical| {
            let mut tf_columns: Vec<&ColumnIdentifier> = Vec::new();
            for column in columns {
                if !tf_columns.iter().any(|c| c.name() == column.name()) {
                    tf_columns.push(column);
                }
            }

            let dialect = self.executor.dialect();
            let mut select = vec!["c.*".to_string()];
            let mut joins = String::new();
            for (i, column) in tf_columns.iter().enumerate() {
                let tf_table = self.compute_tf_table(column)?;
                let alias = format!("tf{}", i);
                let tf = column.tf_name().quoted(dialect.as_ref());
                select.push(format!("{}.{} AS {}", alias, tf, tf));
                joins.push_str(&format!(
                    "\nLEFT JOIN {} AS {} ON c.{} = {}",
                    tf_table.quoted_name(),
                    alias,
                    column.quoted(dialect.as_ref()),
                    column.qualified(&alias, dialect.as_ref())
                ));
            }

            let mut pipeline = Pipeline::new();
            self.enqueue_df_concat(&mut pipeline)?;
            pipeline.enqueue_sql(
                format!(
                    "SELECT {}\nFROM {} AS c{}",
                    select.join(", "),
                    LogicalTableName::concat(),
                    joins
                ),
                logical.as_str(),
            )?;
            Ok(self.executor.submit(&pipeline, physical)?)
        })
    }

    // ---- Graph metrics ----

    /// Cluster metrics of `clusters` over the edges of `edges` at or above
    /// `threshold`. Columns: `cluster_id, n_nodes, n_edges, density`.
    pub fn compute_cluster_metrics(
        &self,
        edges: &TableHandle,
        clusters: &TableHandle,
        threshold: f64,
    ) -> Result<TableHandle, TableManagementError> {
        let output =
            PhysicalTableName::unique(&LogicalTableName::cluster_metrics(), &self.cache.run_token());
        Ok(GraphMetricsEngine::new(&self.executor, &self.graph_columns)
            .compute_cluster_metrics(edges, clusters, threshold, &output)?)
    }

    /// Node degrees over the edges of `edges` at or above `threshold`.
    /// Columns: `node_id, node_degree`.
    pub fn compute_node_metrics(
        &self,
        edges: &TableHandle,
        threshold: f64,
    ) -> Result<TableHandle, TableManagementError> {
        let output =
            PhysicalTableName::unique(&LogicalTableName::node_metrics(), &self.cache.run_token());
        Ok(GraphMetricsEngine::new(&self.executor, &self.graph_columns)
            .compute_node_metrics(edges, threshold, &output)?)
    }

    pub fn compute_graph_metrics(
        &self,
        edges: &TableHandle,
        clusters: &TableHandle,
        threshold: f64,
    ) -> Result<GraphMetricsTables, TableManagementError> {
        Ok(GraphMetricsTables {
            clusters: self.compute_cluster_metrics(edges, clusters, threshold)?,
            nodes: self.compute_node_metrics(edges, threshold)?,
        })
    }
}

fn contains_column(columns: &[String], column: &ColumnIdentifier) -> bool {
    columns.iter().any(|c| c.eq_ignore_ascii_case(column.name()))
}
