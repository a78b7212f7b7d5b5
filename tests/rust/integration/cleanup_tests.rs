//! Table cleanup: invalidation drops old tables on a best-effort basis.

use std::sync::{Arc, Mutex};

use linkgraph::backend::{Backend, BackendError, Row};
use linkgraph::pipeline::Pipeline;
use linkgraph::sql::{Dialect, SqliteDialect};
use linkgraph::{Executor, IntermediateTableCache, LogicalTableName, TableHandle};
use mockall::mock;
use serde_json::{json, Value};

use super::fixtures::{manager, register};

mock! {
    pub Engine {}

    impl Backend for Engine {
        fn dialect(&self) -> Arc<dyn Dialect>;
        fn execute(&self, sql: &str) -> Result<(), BackendError>;
        fn query_rows(&self, sql: &str) -> Result<Vec<Row>, BackendError>;
        fn table_columns(&self, table: &str) -> Result<Vec<String>, BackendError>;
        fn table_exists(&self, table: &str) -> Result<bool, BackendError>;
        fn list_tables(&self) -> Result<Vec<String>, BackendError>;
        fn drop_table(&self, table: &str) -> Result<(), BackendError>;
        fn create_table_from_records(
            &self,
            table: &str,
            columns: &[String],
            rows: &[Vec<Value>],
        ) -> Result<(), BackendError>;
    }
}

fn engine_accepting_creates() -> MockEngine {
    let mut engine = MockEngine::new();
    engine
        .expect_dialect()
        .returning(|| Arc::new(SqliteDialect) as Arc<dyn Dialect>);
    engine.expect_execute().returning(|_| Ok(()));
    engine
}

fn cache_with_one_entry(engine: MockEngine) -> (IntermediateTableCache, TableHandle) {
    let executor = Arc::new(Executor::new(Arc::new(engine)));
    let cache = IntermediateTableCache::new(Arc::clone(&executor));
    let logical = LogicalTableName::new("df_example").unwrap();
    let handle = cache
        .get_or_compute(&logical, |physical| {
            let mut pipeline = Pipeline::new();
            pipeline.enqueue_sql("SELECT 1 AS one", "df_example")?;
            executor.submit(&pipeline, physical)
        })
        .expect("Mock engine accepts every statement");
    (cache, handle)
}

#[test]
fn test_listing_failure_does_not_fail_invalidation() {
    let mut engine = engine_accepting_creates();
    engine
        .expect_list_tables()
        .times(1)
        .returning(|| Err(BackendError::TableNotFound("sqlite_master".to_string())));

    let (cache, _) = cache_with_one_entry(engine);
    cache.invalidate_all();

    assert!(cache.is_empty());
    assert_eq!(cache.epoch(), 1);
}

#[test]
fn test_drop_failure_does_not_fail_invalidation() {
    let mut engine = engine_accepting_creates();
    let listed = Arc::new(Mutex::new(Vec::<String>::new()));
    let tables = Arc::clone(&listed);
    engine
        .expect_list_tables()
        .times(1)
        .returning(move || Ok(tables.lock().unwrap().clone()));
    engine
        .expect_drop_table()
        .times(1)
        .returning(|table| Err(BackendError::TableNotFound(table.to_string())));

    let (cache, handle) = cache_with_one_entry(engine);
    let prefix = cache.run_token().table_prefix();
    listed
        .lock()
        .unwrap()
        .extend(["people".to_string(), handle.physical_name().to_string()]);

    cache.invalidate_all();
    assert!(cache.is_empty());
    assert_ne!(cache.run_token().table_prefix(), prefix);
}

#[test]
fn test_only_old_epoch_tables_are_dropped() {
    let mut engine = engine_accepting_creates();
    // Another session's table and a user table: neither may be dropped
    engine.expect_list_tables().times(1).returning(|| {
        Ok(vec![
            "__lg_othersess_0__df_predict".to_string(),
            "people".to_string(),
        ])
    });
    engine.expect_drop_table().times(0);

    let (cache, _) = cache_with_one_entry(engine);
    cache.invalidate_all();
    assert_eq!(cache.epoch(), 1);
}

#[test]
fn test_delete_tables_created_by_core() {
    let mut manager = manager();
    let people = register(&manager, "people", vec![json!({"unique_id": 1, "surname": "Fox"})]);
    manager.add_input_table("people", "people").unwrap();

    let tf = manager
        .compute_tf_table(&linkgraph::ColumnIdentifier::new("surname"))
        .unwrap();
    let labels = manager
        .register_labels_table(
            linkgraph::InputData::from_json_rows(vec![json!({"unique_id_l": 1, "unique_id_r": 1})])
                .unwrap(),
            false,
        )
        .unwrap();

    manager.delete_tables_created_by_core().unwrap();

    assert!(!tf.exists().unwrap());
    assert!(!labels.exists().unwrap());
    assert!(people.exists().unwrap());
    assert!(manager.cache().is_empty());
}
