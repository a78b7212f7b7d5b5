//! SQL for the graph metrics pipelines.
//!
//! Everything here is generic SQL: identifiers go through the dialect, the
//! only type name used is `VARCHAR`. Statement names are the CTE names the
//! pipelines use; only the last statement of each pipeline is materialized.

use super::GraphColumns;
use crate::sql::{ColumnIdentifier, Dialect};

pub const EDGES_FILTERED: &str = "edges_filtered";
pub const CLUSTER_NODES: &str = "cluster_nodes";
pub const CLUSTER_SIZES: &str = "cluster_sizes";
pub const CLUSTER_EDGE_COUNTS: &str = "cluster_edge_counts";
pub const EDGE_ENDPOINTS: &str = "edge_endpoints";
pub const ORPHAN_EDGES: &str = "orphan_edges";

/// Separator between dataset alias and record id in composite node ids.
pub const COMPOSITE_ID_SEPARATOR: &str = "-__-";

/// Node id expression for `alias`: the id column itself, or
/// `dataset || '-__-' || CAST(id AS VARCHAR)` when a dataset column is given.
pub fn node_id_expr(
    alias: &str,
    id: &ColumnIdentifier,
    dataset: Option<&ColumnIdentifier>,
    dialect: &dyn Dialect,
) -> String {
    match dataset {
        None => id.qualified(alias, dialect),
        Some(dataset) => format!(
            "{} || {} || CAST({} AS VARCHAR)",
            dataset.qualified(alias, dialect),
            dialect.string_literal(COMPOSITE_ID_SEPARATOR),
            id.qualified(alias, dialect)
        ),
    }
}

/// Threshold as a SQL numeric literal. `f64`'s `Display` never uses
/// exponent notation and round-trips, so the comparison in SQL sees the
/// same double the caller passed.
pub fn threshold_literal(threshold: f64) -> String {
    format!("{}", threshold)
}

/// Edges at or above `threshold`, reduced to their two node ids.
pub fn filtered_edges_sql(
    edges_table: &str,
    columns: &GraphColumns,
    threshold: f64,
    dialect: &dyn Dialect,
) -> String {
    let datasets = columns.source_dataset.as_ref();
    let left = node_id_expr("e", &columns.left_id, datasets.map(|d| &d.left), dialect);
    let right = node_id_expr("e", &columns.right_id, datasets.map(|d| &d.right), dialect);
    format!(
        "SELECT {} AS node_id_l, {} AS node_id_r\nFROM {} AS e\nWHERE {} >= {}",
        left,
        right,
        edges_table,
        columns.match_probability.qualified("e", dialect),
        threshold_literal(threshold)
    )
}

pub fn cluster_nodes_sql(clusters_table: &str, columns: &GraphColumns, dialect: &dyn Dialect) -> String {
    let dataset = columns.source_dataset.as_ref().map(|d| &d.node);
    format!(
        "SELECT {} AS node_id, {} AS cluster_id\nFROM {} AS c",
        node_id_expr("c", &columns.node_id, dataset, dialect),
        columns.cluster_id.qualified("c", dialect),
        clusters_table
    )
}

pub fn cluster_sizes_sql() -> String {
    format!(
        "SELECT cluster_id, COUNT(*) AS n_nodes\nFROM {}\nGROUP BY cluster_id",
        CLUSTER_NODES
    )
}

/// Edges whose endpoints both map to the same cluster, counted per cluster.
/// Inner joins drop edges touching unassigned nodes.
pub fn cluster_edge_counts_sql() -> String {
    format!(
        "SELECT cl.cluster_id AS cluster_id, COUNT(*) AS n_edges\n\
         FROM {edges} AS f\n\
         INNER JOIN {nodes} AS cl ON f.node_id_l = cl.node_id\n\
         INNER JOIN {nodes} AS cr ON f.node_id_r = cr.node_id\n\
         WHERE cl.cluster_id = cr.cluster_id\n\
         GROUP BY cl.cluster_id",
        edges = EDGES_FILTERED,
        nodes = CLUSTER_NODES
    )
}

/// Final cluster metrics. Clusters without internal edges come through the
/// left join with `n_edges = 0`; singletons get a NULL density.
pub fn cluster_metrics_sql() -> String {
    format!(
        "SELECT\n\
         s.cluster_id AS cluster_id,\n\
         s.n_nodes AS n_nodes,\n\
         COALESCE(ec.n_edges, 0) AS n_edges,\n\
         CASE WHEN s.n_nodes > 1\n\
         THEN 2.0 * COALESCE(ec.n_edges, 0) / (s.n_nodes * (s.n_nodes - 1))\n\
         ELSE NULL END AS density\n\
         FROM {sizes} AS s\n\
         LEFT JOIN {counts} AS ec ON s.cluster_id = ec.cluster_id",
        sizes = CLUSTER_SIZES,
        counts = CLUSTER_EDGE_COUNTS
    )
}

/// One row per edge end, so a self edge yields two rows for its node.
pub fn edge_endpoints_sql() -> String {
    format!(
        "SELECT node_id_l AS node_id FROM {edges}\n\
         UNION ALL\n\
         SELECT node_id_r AS node_id FROM {edges}",
        edges = EDGES_FILTERED
    )
}

pub fn node_degree_sql() -> String {
    format!(
        "SELECT node_id, COUNT(*) AS node_degree\nFROM {}\nGROUP BY node_id",
        EDGE_ENDPOINTS
    )
}

/// Number of filtered edges with an endpoint missing from the assignment.
pub fn orphan_edges_sql() -> String {
    format!(
        "SELECT COUNT(*) AS n_orphan_edges\n\
         FROM {edges} AS f\n\
         LEFT JOIN {nodes} AS cl ON f.node_id_l = cl.node_id\n\
         LEFT JOIN {nodes} AS cr ON f.node_id_r = cr.node_id\n\
         WHERE cl.node_id IS NULL OR cr.node_id IS NULL",
        edges = EDGES_FILTERED,
        nodes = CLUSTER_NODES
    )
}
