//! Shared test data.
//!
//! Scenario B: 23 nodes in 4 clusters. Edges at or above 0.95 give
//! `(n_nodes, n_edges)` of `(4,4) (6,5) (2,1) (11,19)`; the edges below 0.95
//! must not change anything.

use std::sync::Arc;

use linkgraph::backend::{ExecutionMode, SqliteBackend};
use linkgraph::{Executor, InputData, TableHandle, TableManager};
use serde_json::{json, Value};

pub fn manager() -> TableManager {
    manager_with_mode(ExecutionMode::Single)
}

pub fn manager_with_mode(mode: ExecutionMode) -> TableManager {
    let backend = SqliteBackend::in_memory().expect("Failed to open in-memory database");
    TableManager::new(Arc::new(Executor::new(Arc::new(backend)).with_mode(mode)))
}

pub fn register(manager: &TableManager, name: &str, rows: Vec<Value>) -> TableHandle {
    let data = InputData::from_json_rows(rows).expect("Rows must be objects");
    manager
        .register_table(data, name, false)
        .expect("Failed to register table")
}

fn edge(id_l: i64, id_r: i64, group: Option<i64>, match_probability: f64) -> Value {
    json!({
        "unique_id_l": id_l,
        "unique_id_r": id_r,
        "cluster_id": group,
        "match_probability": match_probability,
    })
}

pub fn scenario_b_edges() -> Vec<Value> {
    vec![
        // cluster 1: 4 nodes, 4 edges
        edge(1, 2, Some(1), 0.96),
        edge(1, 3, Some(1), 0.98),
        edge(1, 4, Some(1), 0.98),
        edge(2, 4, Some(1), 0.98),
        // cluster 2: 6 nodes, 5 edges
        edge(5, 6, Some(2), 0.96),
        edge(5, 7, Some(2), 0.97),
        edge(5, 9, Some(2), 0.99),
        edge(7, 8, Some(2), 0.96),
        edge(9, 10, Some(2), 0.96),
        // cluster 3: 2 nodes, 1 edge
        edge(11, 12, Some(3), 0.99),
        // cluster 4: 11 nodes, 19 edges
        edge(13, 14, Some(4), 0.99),
        edge(13, 15, Some(4), 0.99),
        edge(13, 16, Some(4), 0.99),
        edge(13, 17, Some(4), 0.99),
        edge(13, 18, Some(4), 0.99),
        edge(13, 19, Some(4), 0.99),
        edge(14, 15, Some(4), 0.99),
        edge(14, 16, Some(4), 0.99),
        edge(15, 16, Some(4), 0.99),
        edge(15, 17, Some(4), 0.99),
        edge(16, 18, Some(4), 0.99),
        edge(16, 20, Some(4), 0.99),
        edge(17, 21, Some(4), 0.99),
        edge(18, 19, Some(4), 0.99),
        edge(18, 21, Some(4), 0.99),
        edge(18, 22, Some(4), 0.99),
        edge(20, 22, Some(4), 0.99),
        edge(20, 23, Some(4), 0.99),
        edge(22, 23, Some(4), 0.99),
        // below the 0.95 threshold
        edge(1, 8, None, 0.94),
        edge(2, 3, None, 0.92),
        edge(5, 10, None, 0.93),
        edge(4, 11, None, 0.945),
        edge(5, 16, None, 0.9),
        edge(7, 20, None, 0.93),
        edge(17, 20, None, 0.92),
    ]
}

pub fn scenario_b_clusters() -> Vec<Value> {
    let ranges = [(1, 1..=4), (2, 5..=10), (3, 11..=12), (4, 13..=23)];
    ranges
        .into_iter()
        .flat_map(|(cluster, ids)| ids.map(move |id| json!({"cluster_id": cluster, "unique_id": id})))
        .collect()
}

/// Node degrees of scenario B at threshold 0.95.
pub const SCENARIO_B_DEGREES: [(i64, u64); 23] = [
    (1, 3),
    (2, 2),
    (3, 1),
    (4, 2),
    (5, 3),
    (6, 1),
    (7, 2),
    (8, 1),
    (9, 2),
    (10, 1),
    (11, 1),
    (12, 1),
    (13, 6),
    (14, 3),
    (15, 4),
    (16, 5),
    (17, 3),
    (18, 5),
    (19, 2),
    (20, 3),
    (21, 2),
    (22, 3),
    (23, 2),
];

/// Edges and clusters of scenario B registered as `df_e` and `df_c`.
pub fn scenario_b(manager: &TableManager) -> (TableHandle, TableHandle) {
    let edges = register(manager, "df_e", scenario_b_edges());
    let clusters = register(manager, "df_c", scenario_b_clusters());
    (edges, clusters)
}
