//! Centralized table naming: logical names, run tokens and physical names.
//!
//! **CRITICAL**: every materialized table name MUST be produced here. The
//! cache relies on physical names being a pure function of the logical name
//! and the run token, and invalidation cleanup relies on every table of a run
//! sharing the run's prefix.
//!
//! ## Naming Convention
//! - Logical: `df_concat_with_tf`, `df_tf_{column}`, `df_predict`, ...
//! - Run prefix: `__lg_{session}_{epoch}__`
//! - Physical: `{run_prefix}{logical}` (cached tables)
//! - Physical: `{run_prefix}{logical}_{random}` (one-off outputs)
//!
//! Examples:
//! - `df_predict` in session `a1b2c3d4`, epoch 0 → `__lg_a1b2c3d4_0__df_predict`
//! - the same after one invalidation → `__lg_a1b2c3d4_1__df_predict`

use std::fmt;

use thiserror::Error;

use crate::sql::ColumnIdentifier;

/// Prefix shared by every table this crate creates.
pub const TABLE_PREFIX: &str = "__lg_";

const SESSION_LEN: usize = 8;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TableNameError {
    #[error("Table name cannot be empty")]
    Empty,
    #[error("Table name '{0}' must start with a letter or underscore and contain only ASCII letters, digits and underscores")]
    InvalidCharacters(String),
}

/// Check that `name` is a bare SQL identifier (no quoting needed anywhere).
pub fn validate_identifier(name: &str) -> Result<(), TableNameError> {
    let mut chars = name.chars();
    match chars.next() {
        None => Err(TableNameError::Empty),
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
                Ok(())
            } else {
                Err(TableNameError::InvalidCharacters(name.to_string()))
            }
        }
        Some(_) => Err(TableNameError::InvalidCharacters(name.to_string())),
    }
}

/// Role-based name of a derived table, independent of any run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LogicalTableName(String);

impl LogicalTableName {
    pub fn new(name: impl Into<String>) -> Result<Self, TableNameError> {
        let name = name.into();
        validate_identifier(&name)?;
        Ok(LogicalTableName(name))
    }

    /// Vertical concatenation of all input tables.
    pub fn concat() -> Self {
        LogicalTableName("df_concat".to_string())
    }

    /// Concatenated input joined with every term frequency column.
    pub fn concat_with_tf() -> Self {
        LogicalTableName("df_concat_with_tf".to_string())
    }

    /// Term frequency lookup for one input column.
    ///
    /// Characters that are not valid in a bare identifier are replaced with
    /// underscores, so `"first name"` maps to `df_tf_first_name`.
    pub fn term_frequencies(column: &ColumnIdentifier) -> Self {
        let sanitized: String = column
            .name()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        LogicalTableName(format!("df_tf_{}", sanitized))
    }

    /// Scored pairwise edges.
    pub fn predict() -> Self {
        LogicalTableName("df_predict".to_string())
    }

    pub fn labels() -> Self {
        LogicalTableName("df_labels".to_string())
    }

    pub fn cluster_metrics() -> Self {
        LogicalTableName("df_cluster_metrics".to_string())
    }

    pub fn node_metrics() -> Self {
        LogicalTableName("df_node_metrics".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LogicalTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Scope of physical table names: a per-cache session plus an epoch that
/// moves forward on every invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunToken {
    session: String,
    epoch: u64,
}

impl RunToken {
    pub fn new(session: impl Into<String>, epoch: u64) -> Result<Self, TableNameError> {
        let session = session.into();
        if session.is_empty() {
            return Err(TableNameError::Empty);
        }
        if !session.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(TableNameError::InvalidCharacters(session));
        }
        Ok(RunToken { session, epoch })
    }

    /// Fresh token with a random session and epoch 0.
    pub fn random() -> Self {
        RunToken {
            session: random_suffix(SESSION_LEN),
            epoch: 0,
        }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The same session, one epoch later.
    pub fn next_epoch(&self) -> Self {
        RunToken {
            session: self.session.clone(),
            epoch: self.epoch + 1,
        }
    }

    /// Prefix shared by every physical table created under this token.
    pub fn table_prefix(&self) -> String {
        format!("{}{}_{}__", TABLE_PREFIX, self.session, self.epoch)
    }
}

/// Concrete name of a materialized table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhysicalTableName {
    logical: LogicalTableName,
    name: String,
}

impl PhysicalTableName {
    /// Name of the cached table for `logical` under `run`.
    pub fn resolve(logical: &LogicalTableName, run: &RunToken) -> Self {
        PhysicalTableName {
            logical: logical.clone(),
            name: format!("{}{}", run.table_prefix(), logical),
        }
    }

    /// One-off name under `run`, for outputs that are never looked up by
    /// logical name (metrics at a given threshold, labels).
    pub fn unique(logical: &LogicalTableName, run: &RunToken) -> Self {
        PhysicalTableName {
            logical: logical.clone(),
            name: format!(
                "{}{}_{}",
                run.table_prefix(),
                logical,
                random_suffix(SESSION_LEN)
            ),
        }
    }

    /// A table whose physical name is its logical name (user registered
    /// tables, pre-existing inputs).
    pub fn verbatim(logical: LogicalTableName) -> Self {
        let name = logical.as_str().to_string();
        PhysicalTableName { logical, name }
    }

    pub fn logical(&self) -> &LogicalTableName {
        &self.logical
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for PhysicalTableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Split a physical name produced by [`PhysicalTableName::resolve`] back into
/// its run token and logical name.
///
/// # Examples
/// ```
/// use linkgraph::utils::table_naming::parse_physical_name;
///
/// let (run, logical) = parse_physical_name("__lg_a1b2c3d4_3__df_predict").unwrap();
/// assert_eq!(run.session(), "a1b2c3d4");
/// assert_eq!(run.epoch(), 3);
/// assert_eq!(logical.as_str(), "df_predict");
/// assert!(parse_physical_name("users").is_none());
/// ```
pub fn parse_physical_name(name: &str) -> Option<(RunToken, LogicalTableName)> {
    let rest = name.strip_prefix(TABLE_PREFIX)?;
    let (scope, logical) = rest.split_once("__")?;
    let (session, epoch) = scope.rsplit_once('_')?;
    let epoch = epoch.parse().ok()?;
    let run = RunToken::new(session, epoch).ok()?;
    let logical = LogicalTableName::new(logical).ok()?;
    Some((run, logical))
}

fn random_suffix(len: usize) -> String {
    uuid::Uuid::new_v4().simple().to_string()[..len].to_string()
}
