//! Cluster and node metrics over a scored edge list
//!
//! Both metrics are computed by the backend as `GROUP BY` pipelines; the
//! edge list is never read into memory. The probability threshold is pushed
//! down into the first statement of each pipeline.
//!
//! Cluster metrics, per cluster:
//! - `n_nodes`: nodes assigned to the cluster
//! - `n_edges`: filtered edges with both endpoints in the cluster
//! - `density`: `2 * n_edges / (n_nodes * (n_nodes - 1))`, NULL for singletons
//!
//! Node metrics, per node with at least one filtered edge:
//! - `node_degree`: filtered edges touching the node (a self edge counts twice)
//!
//! Edges between clusters, or touching a node missing from the assignment,
//! never count towards `n_edges`.

pub mod errors;
pub mod sql;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use errors::GraphMetricsError;

use crate::backend::{Executor, TableHandle};
use crate::pipeline::Pipeline;
use crate::sql::ColumnIdentifier;
use crate::utils::table_naming::{LogicalTableName, PhysicalTableName};

/// Dataset columns used to build composite node ids when several input
/// datasets are linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDatasetColumns {
    /// Dataset of the left endpoint in the edge table.
    pub left: ColumnIdentifier,
    /// Dataset of the right endpoint in the edge table.
    pub right: ColumnIdentifier,
    /// Dataset of the node in the cluster table.
    pub node: ColumnIdentifier,
}

/// Column names of the edge and cluster tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphColumns {
    pub left_id: ColumnIdentifier,
    pub right_id: ColumnIdentifier,
    pub match_probability: ColumnIdentifier,
    pub node_id: ColumnIdentifier,
    pub cluster_id: ColumnIdentifier,
    pub source_dataset: Option<SourceDatasetColumns>,
}

impl Default for GraphColumns {
    fn default() -> Self {
        GraphColumns {
            left_id: ColumnIdentifier::new("left_id"),
            right_id: ColumnIdentifier::new("right_id"),
            match_probability: ColumnIdentifier::new("match_probability"),
            node_id: ColumnIdentifier::new("node_id"),
            cluster_id: ColumnIdentifier::new("cluster_id"),
            source_dataset: None,
        }
    }
}

impl GraphColumns {
    /// Columns as a linkage pipeline names them: `unique_id_l`/`unique_id_r`
    /// on edges and `unique_id` on the cluster table.
    pub fn from_unique_id(unique_id: &ColumnIdentifier) -> Self {
        GraphColumns {
            left_id: unique_id.name_l(),
            right_id: unique_id.name_r(),
            node_id: unique_id.clone(),
            ..GraphColumns::default()
        }
    }

    /// Compose node ids as `<dataset>-__-<id>`, reading `column_l`/`column_r`
    /// from edges and `column` from clusters.
    pub fn with_source_dataset(mut self, column: &ColumnIdentifier) -> Self {
        self.source_dataset = Some(SourceDatasetColumns {
            left: column.name_l(),
            right: column.name_r(),
            node: column.clone(),
        });
        self
    }

    fn edge_columns(&self) -> Vec<&ColumnIdentifier> {
        let mut columns = vec![&self.left_id, &self.right_id, &self.match_probability];
        if let Some(ds) = &self.source_dataset {
            columns.extend([&ds.left, &ds.right]);
        }
        columns
    }

    fn cluster_columns(&self) -> Vec<&ColumnIdentifier> {
        let mut columns = vec![&self.node_id, &self.cluster_id];
        if let Some(ds) = &self.source_dataset {
            columns.push(&ds.node);
        }
        columns
    }
}

/// One row of a cluster metrics table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMetrics {
    pub cluster_id: Value,
    pub n_nodes: u64,
    pub n_edges: u64,
    pub density: Option<f64>,
}

/// One row of a node metrics table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    pub node_id: Value,
    pub node_degree: u64,
}

/// Threshold must be a probability.
pub fn validate_threshold(threshold: f64) -> Result<f64, GraphMetricsError> {
    if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(GraphMetricsError::InvalidThreshold(threshold))
    }
}

/// Builds and submits the metrics pipelines against one executor.
pub struct GraphMetricsEngine<'a> {
    executor: &'a Executor,
    columns: &'a GraphColumns,
}

impl<'a> GraphMetricsEngine<'a> {
    pub fn new(executor: &'a Executor, columns: &'a GraphColumns) -> Self {
        GraphMetricsEngine { executor, columns }
    }

    pub fn cluster_metrics_pipeline(
        &self,
        edges: &TableHandle,
        clusters: &TableHandle,
        threshold: f64,
    ) -> Result<Pipeline, GraphMetricsError> {
        let threshold = validate_threshold(threshold)?;
        let dialect = self.executor.dialect();
        let edges_table = dialect.quote_identifier(edges.physical_name().as_str());
        let clusters_table = dialect.quote_identifier(clusters.physical_name().as_str());

        let mut pipeline = Pipeline::new();
        pipeline.enqueue_sql(
            sql::filtered_edges_sql(&edges_table, self.columns, threshold, dialect.as_ref()),
            sql::EDGES_FILTERED,
        )?;
        pipeline.enqueue_sql(
            sql::cluster_nodes_sql(&clusters_table, self.columns, dialect.as_ref()),
            sql::CLUSTER_NODES,
        )?;
        pipeline.enqueue_sql(sql::cluster_sizes_sql(), sql::CLUSTER_SIZES)?;
        pipeline.enqueue_sql(sql::cluster_edge_counts_sql(), sql::CLUSTER_EDGE_COUNTS)?;
        pipeline.enqueue_sql(
            sql::cluster_metrics_sql(),
            LogicalTableName::cluster_metrics().as_str(),
        )?;
        Ok(pipeline)
    }

    pub fn node_metrics_pipeline(
        &self,
        edges: &TableHandle,
        threshold: f64,
    ) -> Result<Pipeline, GraphMetricsError> {
        let threshold = validate_threshold(threshold)?;
        let dialect = self.executor.dialect();
        let edges_table = dialect.quote_identifier(edges.physical_name().as_str());

        let mut pipeline = Pipeline::new();
        pipeline.enqueue_sql(
            sql::filtered_edges_sql(&edges_table, self.columns, threshold, dialect.as_ref()),
            sql::EDGES_FILTERED,
        )?;
        pipeline.enqueue_sql(sql::edge_endpoints_sql(), sql::EDGE_ENDPOINTS)?;
        pipeline.enqueue_sql(
            sql::node_degree_sql(),
            LogicalTableName::node_metrics().as_str(),
        )?;
        Ok(pipeline)
    }

    /// Materialize cluster metrics for `edges` at `threshold` as `output`.
    pub fn compute_cluster_metrics(
        &self,
        edges: &TableHandle,
        clusters: &TableHandle,
        threshold: f64,
        output: &PhysicalTableName,
    ) -> Result<TableHandle, GraphMetricsError> {
        let pipeline = self.cluster_metrics_pipeline(edges, clusters, threshold)?;
        require_columns(edges, &self.columns.edge_columns())?;
        require_columns(clusters, &self.columns.cluster_columns())?;

        if log::log_enabled!(log::Level::Debug) {
            self.log_orphan_edges(edges, clusters, threshold);
        }

        let handle = self.executor.submit(&pipeline, output)?;
        log::info!(
            "Computed cluster metrics at threshold {} into {}",
            threshold,
            handle.physical_name()
        );
        Ok(handle)
    }

    /// Materialize node metrics for `edges` at `threshold` as `output`.
    pub fn compute_node_metrics(
        &self,
        edges: &TableHandle,
        threshold: f64,
        output: &PhysicalTableName,
    ) -> Result<TableHandle, GraphMetricsError> {
        let pipeline = self.node_metrics_pipeline(edges, threshold)?;
        require_columns(edges, &self.columns.edge_columns())?;

        let handle = self.executor.submit(&pipeline, output)?;
        log::info!(
            "Computed node metrics at threshold {} into {}",
            threshold,
            handle.physical_name()
        );
        Ok(handle)
    }

    fn log_orphan_edges(&self, edges: &TableHandle, clusters: &TableHandle, threshold: f64) {
        let result = self
            .cluster_metrics_pipeline(edges, clusters, threshold)
            .and_then(|mut pipeline| {
                pipeline.enqueue_sql(sql::orphan_edges_sql(), sql::ORPHAN_EDGES)?;
                Ok(self.executor.query(&pipeline)?)
            });
        match result {
            Ok(rows) => {
                let orphans = rows
                    .first()
                    .and_then(|row| row.get("n_orphan_edges"))
                    .and_then(Value::as_u64)
                    .unwrap_or(0);
                if orphans > 0 {
                    log::debug!(
                        "{} edges above threshold {} reference nodes missing from {}; excluded",
                        orphans,
                        threshold,
                        clusters.physical_name()
                    );
                }
            }
            Err(e) => log::debug!("Could not count orphan edges: {}", e),
        }
    }
}

fn require_columns(table: &TableHandle, required: &[&ColumnIdentifier]) -> Result<(), GraphMetricsError> {
    let available = table.columns()?;
    for column in required {
        if !available.iter().any(|c| c.eq_ignore_ascii_case(column.name())) {
            return Err(GraphMetricsError::MissingColumn {
                column: column.name().to_string(),
                table: table.physical_name().to_string(),
            });
        }
    }
    Ok(())
}

/// Read a cluster metrics table into typed rows.
pub fn read_cluster_metrics(table: &TableHandle) -> Result<Vec<ClusterMetrics>, GraphMetricsError> {
    read_rows(table)
}

/// Read a node metrics table into typed rows.
pub fn read_node_metrics(table: &TableHandle) -> Result<Vec<NodeMetrics>, GraphMetricsError> {
    read_rows(table)
}

fn read_rows<T: serde::de::DeserializeOwned>(table: &TableHandle) -> Result<Vec<T>, GraphMetricsError> {
    table
        .rows()?
        .into_iter()
        .map(|row| serde_json::from_value(Value::Object(row)).map_err(GraphMetricsError::from))
        .collect()
}
