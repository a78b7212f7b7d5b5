//! Pipeline builder for multi-statement SQL
//!
//! A pipeline is an ordered list of named SQL statements. Each statement may
//! reference physical input tables or any earlier statement by its output
//! name. Nothing runs here: the pipeline is rendered into one `WITH` query
//! (or one query per step) and handed to the executor.
//!
//! ```text
//! enqueue_sql("SELECT ... FROM input", "a")
//! enqueue_sql("SELECT ... FROM a", "b")
//! enqueue_sql("SELECT ... FROM b", "out")
//!
//! WITH
//! a AS (SELECT ... FROM input),
//! b AS (SELECT ... FROM a)
//! SELECT ... FROM b
//! ```

pub mod errors;

pub use errors::PipelineError;

use crate::utils::table_naming::validate_identifier;

/// One statement and the name later statements use to refer to it.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedStatement {
    pub sql: String,
    pub output_name: String,
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    statements: Vec<NamedStatement>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a statement. Output names must be bare identifiers and unique
    /// within the pipeline.
    pub fn enqueue_sql(
        &mut self,
        sql: impl Into<String>,
        output_name: impl Into<String>,
    ) -> Result<(), PipelineError> {
        let output_name = output_name.into();
        validate_identifier(&output_name)?;
        if self.contains(&output_name) {
            return Err(PipelineError::DuplicateOutputName(output_name));
        }
        let sql = sql.into();
        log::debug!("Enqueued pipeline statement '{}'", output_name);
        self.statements.push(NamedStatement { sql, output_name });
        Ok(())
    }

    pub fn contains(&self, output_name: &str) -> bool {
        self.statements
            .iter()
            .any(|s| s.output_name.eq_ignore_ascii_case(output_name))
    }

    pub fn statements(&self) -> &[NamedStatement] {
        &self.statements
    }

    /// Name of the final statement, i.e. what the pipeline produces.
    pub fn output_name(&self) -> Option<&str> {
        self.statements.last().map(|s| s.output_name.as_str())
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Render the whole pipeline as a single query: every statement but the
    /// last becomes a CTE, the last is the outer `SELECT`.
    pub fn render(&self) -> Result<String, PipelineError> {
        let (last, earlier) = self
            .statements
            .split_last()
            .ok_or(PipelineError::EmptyPipeline)?;
        let ctes: Vec<String> = earlier
            .iter()
            .map(|s| format!("{} AS (\n{}\n)", s.output_name, s.sql))
            .collect();
        Ok(with_clause(&ctes, &last.sql))
    }

    /// Render statement `index` on its own, with every earlier statement
    /// aliased to the table it was materialized into.
    ///
    /// `materialized` maps an earlier output name to an already quoted table
    /// name.
    pub fn render_step<F>(&self, index: usize, materialized: F) -> Result<String, PipelineError>
    where
        F: Fn(&str) -> String,
    {
        let statement = self.statements.get(index).ok_or(PipelineError::StepOutOfRange {
            index,
            len: self.statements.len(),
        })?;
        let aliases: Vec<String> = self.statements[..index]
            .iter()
            .map(|s| {
                format!(
                    "{} AS (\nSELECT * FROM {}\n)",
                    s.output_name,
                    materialized(&s.output_name)
                )
            })
            .collect();
        Ok(with_clause(&aliases, &statement.sql))
    }
}

fn with_clause(ctes: &[String], body: &str) -> String {
    if ctes.is_empty() {
        body.to_string()
    } else {
        format!("WITH\n{}\n{}", ctes.join(",\n"), body)
    }
}
