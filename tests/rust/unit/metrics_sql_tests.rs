//! Generated graph metrics SQL, checked as text in both dialects.

use linkgraph::graph_metrics::sql::{
    cluster_edge_counts_sql, edge_endpoints_sql, filtered_edges_sql, node_degree_sql,
    threshold_literal,
};
use linkgraph::graph_metrics::GraphColumns;
use linkgraph::pipeline::Pipeline;
use linkgraph::sql::{ClickHouseDialect, Dialect, SqliteDialect};
use linkgraph::ColumnIdentifier;
use test_case::test_case;

#[test_case(0.95, "0.95" ; "typical")]
#[test_case(0.0, "0" ; "zero")]
#[test_case(1.0, "1" ; "one")]
#[test_case(0.999999, "0.999999" ; "many digits")]
#[test_case(0.00001, "0.00001" ; "small")]
fn test_threshold_literal(threshold: f64, expected: &str) {
    assert_eq!(threshold_literal(threshold), expected);
}

#[test]
fn test_threshold_is_pushed_into_edge_scan() {
    let columns = GraphColumns::from_unique_id(&ColumnIdentifier::new("unique_id"));
    let sql = filtered_edges_sql("\"df_predict\"", &columns, 0.95, &SqliteDialect);
    println!("Generated SQL:\n{}", sql);

    assert!(
        sql.contains("FROM \"df_predict\" AS e\nWHERE e.\"match_probability\" >= 0.95"),
        "Threshold must be applied while scanning edges. SQL:\n{}",
        sql
    );
    assert!(!sql.contains("GROUP BY"));
}

#[test]
fn test_node_metrics_pipeline_renders_union_then_group_by() {
    let columns = GraphColumns::from_unique_id(&ColumnIdentifier::new("unique_id"));
    let mut pipeline = Pipeline::new();
    pipeline
        .enqueue_sql(
            filtered_edges_sql("\"edges\"", &columns, 0.5, &SqliteDialect),
            "edges_filtered",
        )
        .unwrap();
    pipeline
        .enqueue_sql(edge_endpoints_sql(), "edge_endpoints")
        .unwrap();
    pipeline
        .enqueue_sql(node_degree_sql(), "df_node_metrics")
        .unwrap();

    let sql = pipeline.render().expect("Failed to render pipeline");
    println!("Generated SQL:\n{}", sql);

    let union_pos = sql.find("UNION ALL").expect("UNION ALL must exist");
    let group_pos = sql.find("GROUP BY node_id").expect("GROUP BY must exist");
    assert!(union_pos < group_pos);
    assert!(sql.starts_with("WITH\nedges_filtered AS ("));
}

#[test]
fn test_cluster_edges_require_same_cluster_on_both_ends() {
    let sql = cluster_edge_counts_sql();
    assert!(sql.contains("ON f.node_id_l = cl.node_id"));
    assert!(sql.contains("ON f.node_id_r = cr.node_id"));
    assert!(sql.contains("WHERE cl.cluster_id = cr.cluster_id"));
}

#[test]
fn test_composite_ids_translate_for_clickhouse() {
    let columns = GraphColumns::from_unique_id(&ColumnIdentifier::new("unique_id"))
        .with_source_dataset(&ColumnIdentifier::new("source_dataset"));
    let generic = filtered_edges_sql("`df_predict`", &columns, 0.9, &ClickHouseDialect);
    let translated = ClickHouseDialect
        .translate(&generic)
        .expect("Failed to translate SQL");
    println!("Translated SQL:\n{}", translated);

    assert!(translated.contains("CAST(e.`unique_id_l` AS String)"));
    assert!(translated.contains("'-__-'"));
    assert!(!translated.contains("VARCHAR"));
}
