use std::fmt;

use serde::{Deserialize, Serialize};

use super::dialect::Dialect;

/// A column name as configured, plus the derived names the pipeline uses.
///
/// Names may be given already quoted (`"first name"` or `` `first name` ``);
/// the surrounding quotes are stripped and quoting is reapplied per dialect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct ColumnIdentifier {
    name: String,
}

impl ColumnIdentifier {
    pub fn new(name: impl AsRef<str>) -> Self {
        let raw = name.as_ref().trim();
        let unquoted = [('"', '"'), ('`', '`'), ('[', ']')]
            .iter()
            .find_map(|(open, close)| {
                raw.strip_prefix(*open)
                    .and_then(|rest| rest.strip_suffix(*close))
            })
            .unwrap_or(raw);
        ColumnIdentifier {
            name: unquoted.to_string(),
        }
    }

    /// The raw, unquoted name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn quoted(&self, dialect: &dyn Dialect) -> String {
        dialect.quote_identifier(&self.name)
    }

    /// `alias.column`, with the column quoted.
    pub fn qualified(&self, table_alias: &str, dialect: &dyn Dialect) -> String {
        format!("{}.{}", table_alias, self.quoted(dialect))
    }

    /// Left-hand side of a pairwise comparison (`unique_id` → `unique_id_l`).
    pub fn name_l(&self) -> Self {
        self.with_suffix("_l")
    }

    /// Right-hand side of a pairwise comparison (`unique_id` → `unique_id_r`).
    pub fn name_r(&self) -> Self {
        self.with_suffix("_r")
    }

    /// Term frequency column for this column (`surname` → `tf_surname`).
    pub fn tf_name(&self) -> Self {
        ColumnIdentifier {
            name: format!("tf_{}", self.name),
        }
    }

    fn with_suffix(&self, suffix: &str) -> Self {
        ColumnIdentifier {
            name: format!("{}{}", self.name, suffix),
        }
    }
}

impl From<String> for ColumnIdentifier {
    fn from(name: String) -> Self {
        ColumnIdentifier::new(name)
    }
}

impl From<&str> for ColumnIdentifier {
    fn from(name: &str) -> Self {
        ColumnIdentifier::new(name)
    }
}

impl From<ColumnIdentifier> for String {
    fn from(column: ColumnIdentifier) -> Self {
        column.name
    }
}

impl fmt::Display for ColumnIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
