//! Single vs stepwise execution: same results, different error precision.

use linkgraph::backend::{ExecutionMode, ExecutorError};
use linkgraph::graph_metrics::read_cluster_metrics;
use linkgraph::pipeline::Pipeline;
use linkgraph::{LogicalTableName, PhysicalTableName};

use super::fixtures::{manager_with_mode, scenario_b};

fn broken_pipeline() -> Pipeline {
    let mut pipeline = Pipeline::new();
    pipeline.enqueue_sql("SELECT 1 AS a", "first").unwrap();
    pipeline
        .enqueue_sql("SELECT no_such_column FROM first", "second")
        .unwrap();
    pipeline.enqueue_sql("SELECT * FROM second", "third").unwrap();
    pipeline
}

fn output() -> PhysicalTableName {
    PhysicalTableName::verbatim(LogicalTableName::new("result_table").unwrap())
}

#[test]
fn test_stepwise_error_names_failing_statement() {
    let manager = manager_with_mode(ExecutionMode::Stepwise);
    let err = manager
        .executor()
        .submit(&broken_pipeline(), &output())
        .unwrap_err();

    assert!(matches!(err, ExecutorError::BackendExecution { .. }));
    assert_eq!(err.statement(), Some("second"));
    assert!(err.to_string().contains("'second'"), "{}", err);

    // Step tables are dropped even on failure
    let tables = manager.executor().backend().list_tables().unwrap();
    assert!(tables.is_empty(), "leftover tables: {:?}", tables);
}

#[test]
fn test_single_mode_error_names_pipeline_output() {
    let manager = manager_with_mode(ExecutionMode::Single);
    let err = manager
        .executor()
        .submit(&broken_pipeline(), &output())
        .unwrap_err();
    assert_eq!(err.statement(), Some("third"));
    assert!(!manager.executor().backend().table_exists("result_table").unwrap());
}

#[test]
fn test_empty_pipeline_is_rejected() {
    let manager = manager_with_mode(ExecutionMode::Single);
    assert!(matches!(
        manager.executor().submit(&Pipeline::new(), &output()),
        Err(ExecutorError::Pipeline(_))
    ));
}

#[test]
fn test_stepwise_matches_single() {
    let single = manager_with_mode(ExecutionMode::Single);
    let stepwise = manager_with_mode(ExecutionMode::Stepwise);

    let mut results = Vec::new();
    for manager in [&single, &stepwise] {
        let (edges, clusters) = scenario_b(manager);
        let metrics = manager
            .compute_cluster_metrics(&edges, &clusters, 0.95)
            .expect("Failed to compute cluster metrics");
        let mut rows = read_cluster_metrics(&metrics).unwrap();
        rows.sort_by_key(|r| r.cluster_id.as_i64());
        results.push(rows);

        // Only inputs and the metrics table remain
        let tables = manager.executor().backend().list_tables().unwrap();
        assert_eq!(tables.len(), 3, "tables: {:?}", tables);
    }
    assert_eq!(results[0], results[1]);
}
