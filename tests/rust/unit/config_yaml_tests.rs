//! Loading `LinkerConfig` from YAML files.

use std::io::Write;

use linkgraph::backend::ExecutionMode;
use linkgraph::config::{ConfigError, LinkerConfig};

fn yaml_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config");
    file
}

#[test]
fn test_full_yaml_config() {
    let file = yaml_file(
        r#"
database_path: /data/linkage.db
unique_id_column: person_id
input_tables: [left_people, right_people]
input_table_aliases: [df_left, df_right]
execution_mode: stepwise
default_threshold: 0.9
"#,
    );
    let config = LinkerConfig::from_yaml_file(file.path()).expect("Failed to load config");

    assert_eq!(config.unique_id_column, "person_id");
    assert_eq!(config.source_dataset_column, "source_dataset");
    assert_eq!(config.execution_mode, ExecutionMode::Stepwise);
    assert_eq!(config.default_threshold, 0.9);

    let columns = config.graph_columns();
    assert_eq!(columns.left_id.name(), "person_id_l");
    assert_eq!(columns.node_id.name(), "person_id");
    assert!(columns.source_dataset.is_some());
}

#[test]
fn test_explicit_graph_columns() {
    let file = yaml_file(
        r#"
graph_columns:
  left_id: id_a
  right_id: id_b
  match_probability: score
  node_id: id
  cluster_id: group_id
"#,
    );
    let config = LinkerConfig::from_yaml_file(file.path()).expect("Failed to load config");
    let columns = config.graph_columns();
    assert_eq!(columns.match_probability.name(), "score");
    assert_eq!(columns.cluster_id.name(), "group_id");
    assert!(columns.source_dataset.is_none());
}

#[test]
fn test_empty_yaml_uses_defaults() {
    let file = yaml_file("{}\n");
    let config = LinkerConfig::from_yaml_file(file.path()).expect("Failed to load config");
    assert_eq!(config, LinkerConfig::default());
}

#[test]
fn test_yaml_validation_errors() {
    let file = yaml_file("default_threshold: 2.0\n");
    assert!(matches!(
        LinkerConfig::from_yaml_file(file.path()),
        Err(ConfigError::Validation(_))
    ));

    let file = yaml_file("input_tables: [a, b]\ninput_table_aliases: [x]\n");
    assert!(matches!(
        LinkerConfig::from_yaml_file(file.path()),
        Err(ConfigError::Validation(_))
    ));
}

#[test]
fn test_malformed_yaml() {
    let file = yaml_file("execution_mode: [not, a, mode]\n");
    assert!(matches!(
        LinkerConfig::from_yaml_file(file.path()),
        Err(ConfigError::Parse { .. })
    ));
    assert!(matches!(
        LinkerConfig::from_yaml_file("/definitely/not/here.yaml"),
        Err(ConfigError::Parse { .. })
    ));
}
