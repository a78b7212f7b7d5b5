//! Node degrees and the handshake lemma.

use linkgraph::graph_metrics::{read_node_metrics, GraphMetricsError};
use linkgraph::table_management::TableManagementError;
use serde_json::json;
use test_case::test_case;

use super::fixtures::{manager, register, scenario_b, scenario_b_edges, SCENARIO_B_DEGREES};

fn filtered_edge_count(threshold: f64) -> u64 {
    scenario_b_edges()
        .iter()
        .filter(|e| e["match_probability"].as_f64().unwrap() >= threshold)
        .count() as u64
}

#[test]
fn test_scenario_b_node_degrees() {
    let manager = manager();
    let (edges, _) = scenario_b(&manager);

    let metrics = manager
        .compute_node_metrics(&edges, 0.95)
        .expect("Failed to compute node metrics");
    assert_eq!(metrics.columns().unwrap(), vec!["node_id", "node_degree"]);

    let rows = read_node_metrics(&metrics).unwrap();
    assert_eq!(rows.len(), SCENARIO_B_DEGREES.len());
    for (node_id, degree) in SCENARIO_B_DEGREES {
        let row = rows
            .iter()
            .find(|r| r.node_id == json!(node_id))
            .unwrap_or_else(|| panic!("node {} missing", node_id));
        assert_eq!(row.node_degree, degree, "node {}", node_id);
    }

    // Cluster 4 is nodes 13..=23 with 19 internal edges
    let cluster_4: u64 = rows
        .iter()
        .filter(|r| (13..=23).contains(&r.node_id.as_i64().unwrap()))
        .map(|r| r.node_degree)
        .sum();
    assert_eq!(cluster_4, 38);
}

#[test_case(0.0 ; "everything")]
#[test_case(0.91 ; "includes sub-threshold tail")]
#[test_case(0.95 ; "scenario threshold")]
#[test_case(0.985 ; "strict")]
#[test_case(1.0 ; "nothing")]
fn test_handshake_lemma(threshold: f64) {
    let manager = manager();
    let (edges, _) = scenario_b(&manager);

    let metrics = manager.compute_node_metrics(&edges, threshold).unwrap();
    let degree_sum: u64 = read_node_metrics(&metrics)
        .unwrap()
        .iter()
        .map(|r| r.node_degree)
        .sum();
    assert_eq!(degree_sum, 2 * filtered_edge_count(threshold));
}

#[test_case(0.25)]
#[test_case(0.5)]
#[test_case(0.75)]
#[test_case(0.875)]
fn test_threshold_is_inclusive(threshold: f64) {
    let manager = manager();
    let edges = register(
        &manager,
        "edges",
        vec![
            json!({"unique_id_l": 1, "unique_id_r": 2, "match_probability": threshold}),
            json!({"unique_id_l": 3, "unique_id_r": 4, "match_probability": threshold - 1e-9}),
        ],
    );

    let metrics = manager.compute_node_metrics(&edges, threshold).unwrap();
    let mut nodes: Vec<i64> = read_node_metrics(&metrics)
        .unwrap()
        .iter()
        .map(|r| r.node_id.as_i64().unwrap())
        .collect();
    nodes.sort();
    assert_eq!(nodes, vec![1, 2]);
}

#[test]
fn test_isolated_nodes_have_no_row() {
    let manager = manager();
    let edges = register(
        &manager,
        "edges",
        vec![json!({"unique_id_l": 1, "unique_id_r": 2, "match_probability": 0.1})],
    );
    let metrics = manager.compute_node_metrics(&edges, 0.5).unwrap();
    assert_eq!(metrics.row_count().unwrap(), 0);
}

#[test_case(-0.01 ; "negative")]
#[test_case(1.01 ; "above one")]
#[test_case(f64::NAN ; "nan")]
fn test_invalid_threshold(threshold: f64) {
    let manager = manager();
    let (edges, _) = scenario_b(&manager);
    let err = manager.compute_node_metrics(&edges, threshold).unwrap_err();
    assert!(matches!(
        err,
        TableManagementError::GraphMetrics(GraphMetricsError::InvalidThreshold(_))
    ));
}

#[test]
fn test_missing_probability_column() {
    let manager = manager();
    let edges = register(
        &manager,
        "edges",
        vec![json!({"unique_id_l": 1, "unique_id_r": 2, "score": 0.9})],
    );
    let err = manager.compute_node_metrics(&edges, 0.5).unwrap_err();
    match err {
        TableManagementError::GraphMetrics(GraphMetricsError::MissingColumn { column, table }) => {
            assert_eq!(column, "match_probability");
            assert_eq!(table, "edges");
        }
        other => panic!("unexpected error: {}", other),
    }
}
