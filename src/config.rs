use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use thiserror::Error;
use validator::{Validate, ValidationError};

use crate::backend::ExecutionMode;
use crate::graph_metrics::GraphColumns;
use crate::sql::ColumnIdentifier;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    #[error("Parse error for {field}: {value} - {source}")]
    Parse {
        field: String,
        value: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Linker configuration with validation
#[derive(Clone, Debug, Validate, Serialize, Deserialize, PartialEq)]
#[validate(schema(function = "validate_input_aliases"))]
#[serde(default)]
pub struct LinkerConfig {
    /// SQLite database file; in-memory when absent
    pub database_path: Option<PathBuf>,

    /// Record id column of every input table
    #[validate(length(min = 1, message = "Unique id column cannot be empty"))]
    pub unique_id_column: String,

    /// Column tagging each record with the alias of its input table
    #[validate(length(min = 1, message = "Source dataset column cannot be empty"))]
    pub source_dataset_column: String,

    /// Names of the input tables in the database
    pub input_tables: Vec<String>,

    /// Aliases for `input_tables`, same length when given
    pub input_table_aliases: Vec<String>,

    pub execution_mode: ExecutionMode,

    /// Shorthand for `execution_mode: stepwise`
    pub debug_mode: bool,

    /// Match probability threshold used when a command does not give one
    #[validate(range(
        min = 0.0,
        max = 1.0,
        message = "Threshold must be between 0 and 1"
    ))]
    pub default_threshold: f64,

    /// Edge and cluster table columns; derived from `unique_id_column`
    /// (and `source_dataset_column` for multi-table linkage) when absent
    pub graph_columns: Option<GraphColumns>,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            unique_id_column: "unique_id".to_string(),
            source_dataset_column: "source_dataset".to_string(),
            input_tables: Vec::new(),
            input_table_aliases: Vec::new(),
            execution_mode: ExecutionMode::Single,
            debug_mode: false,
            default_threshold: 0.95,
            graph_columns: None,
        }
    }
}

fn validate_input_aliases(config: &LinkerConfig) -> Result<(), ValidationError> {
    if !config.input_table_aliases.is_empty()
        && config.input_table_aliases.len() != config.input_tables.len()
    {
        let mut error = ValidationError::new("input_table_aliases");
        error.message = Some("Need exactly one alias per input table".into());
        return Err(error);
    }
    Ok(())
}

impl LinkerConfig {
    /// Create configuration from environment variables with validation
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            database_path: env::var("LINKGRAPH_DATABASE").ok().map(PathBuf::from),
            unique_id_column: env::var("LINKGRAPH_UNIQUE_ID_COLUMN")
                .unwrap_or(defaults.unique_id_column),
            source_dataset_column: env::var("LINKGRAPH_SOURCE_DATASET_COLUMN")
                .unwrap_or(defaults.source_dataset_column),
            input_tables: parse_list(&env::var("LINKGRAPH_INPUT_TABLES").unwrap_or_default()),
            input_table_aliases: parse_list(
                &env::var("LINKGRAPH_INPUT_TABLE_ALIASES").unwrap_or_default(),
            ),
            execution_mode: parse_env_var("LINKGRAPH_EXECUTION_MODE", "single")?,
            debug_mode: parse_env_var("LINKGRAPH_DEBUG_MODE", "false")?,
            default_threshold: parse_env_var("LINKGRAPH_THRESHOLD", "0.95")?,
            graph_columns: None,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from YAML file
    pub fn from_yaml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
            field: "yaml_file".to_string(),
            value: "file read failed".to_string(),
            source: Box::new(e),
        })?;

        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            field: "yaml_content".to_string(),
            value: content,
            source: Box::new(e),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply command line overrides on top of this configuration
    pub fn merge_cli(mut self, cli: CliConfig) -> Result<Self, ConfigError> {
        if let Some(path) = cli.database_path {
            self.database_path = Some(path);
        }
        if let Some(mode) = cli.execution_mode {
            self.execution_mode = mode;
        }
        if cli.debug_mode {
            self.debug_mode = true;
        }
        if !cli.input_tables.is_empty() {
            self.input_tables = cli.input_tables;
            self.input_table_aliases = cli.input_table_aliases;
        }
        if let Some(threshold) = cli.default_threshold {
            self.default_threshold = threshold;
        }

        self.validate()?;
        Ok(self)
    }

    /// Execution mode after applying the `debug_mode` shorthand
    pub fn effective_execution_mode(&self) -> ExecutionMode {
        if self.debug_mode {
            ExecutionMode::Stepwise
        } else {
            self.execution_mode
        }
    }

    pub fn unique_id(&self) -> ColumnIdentifier {
        ColumnIdentifier::new(&self.unique_id_column)
    }

    pub fn source_dataset(&self) -> ColumnIdentifier {
        ColumnIdentifier::new(&self.source_dataset_column)
    }

    /// Graph columns, derived from the id columns unless configured.
    /// Node ids are composite as soon as more than one input table is linked.
    pub fn graph_columns(&self) -> GraphColumns {
        if let Some(columns) = &self.graph_columns {
            return columns.clone();
        }
        let columns = GraphColumns::from_unique_id(&self.unique_id());
        if self.input_tables.len() > 1 {
            columns.with_source_dataset(&self.source_dataset())
        } else {
            columns
        }
    }

    /// `(table, alias)` pairs; tables without an alias get `input_table_<i>`.
    pub fn input_tables_with_aliases(&self) -> Vec<(String, String)> {
        self.input_tables
            .iter()
            .enumerate()
            .map(|(i, table)| {
                let alias = self
                    .input_table_aliases
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("input_table_{}", i));
                (table.clone(), alias)
            })
            .collect()
    }
}

/// CLI configuration (parsed from command line arguments)
#[derive(Clone, Debug, Default)]
pub struct CliConfig {
    pub database_path: Option<PathBuf>,
    pub execution_mode: Option<ExecutionMode>,
    pub debug_mode: bool,
    pub input_tables: Vec<String>,
    pub input_table_aliases: Vec<String>,
    pub default_threshold: Option<f64>,
}

/// Parse an environment variable with a default value
fn parse_env_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = env::var(key).unwrap_or_else(|_| default.to_string());
    value.parse().map_err(|e| ConfigError::Parse {
        field: key.to_string(),
        value,
        source: Box::new(e),
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
