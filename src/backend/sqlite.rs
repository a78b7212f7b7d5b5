//! Embedded SQLite backend
//!
//! Reference engine for the execution contract: in-memory for tests and
//! throwaway runs, file-backed when tables should outlive the process.
//!
//! # Concurrency Model
//!
//! A single `Mutex<Connection>`; every call holds the lock for the duration
//! of one statement (or one registration transaction).

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Number, Value};

use super::errors::BackendError;
use super::{Backend, Row};
use crate::sql::{Dialect, SqliteDialect};
use crate::utils::sync::acquire_lock;

pub struct SqliteBackend {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
    dialect: Arc<SqliteDialect>,
}

impl SqliteBackend {
    /// Open (or create) a database file.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path)?;
        log::info!("Opened SQLite database at {}", db_path.display());
        Ok(SqliteBackend {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
            dialect: Arc::new(SqliteDialect),
        })
    }

    pub fn in_memory() -> Result<Self, BackendError> {
        let conn = Connection::open_in_memory()?;
        Ok(SqliteBackend {
            conn: Mutex::new(conn),
            db_path: None,
            dialect: Arc::new(SqliteDialect),
        })
    }

    /// Path of the database file, `None` when in memory.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn quote(&self, ident: &str) -> String {
        self.dialect.quote_identifier(ident)
    }
}

impl Backend for SqliteBackend {
    fn dialect(&self) -> Arc<dyn Dialect> {
        self.dialect.clone()
    }

    fn execute(&self, sql: &str) -> Result<(), BackendError> {
        let conn = acquire_lock(&self.conn, "SQLite connection");
        conn.execute_batch(sql)?;
        Ok(())
    }

    fn query_rows(&self, sql: &str) -> Result<Vec<Row>, BackendError> {
        let conn = acquire_lock(&self.conn, "SQLite connection");
        let mut stmt = conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut map = Row::new();
            for (i, name) in names.iter().enumerate() {
                map.insert(name.clone(), to_json(row.get_ref(i)?));
            }
            out.push(map);
        }
        Ok(out)
    }

    fn table_columns(&self, table: &str) -> Result<Vec<String>, BackendError> {
        let conn = acquire_lock(&self.conn, "SQLite connection");
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", self.quote(table)))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>("name"))?
            .collect::<Result<Vec<_>, _>>()?;
        if columns.is_empty() {
            return Err(BackendError::TableNotFound(table.to_string()));
        }
        Ok(columns)
    }

    fn table_exists(&self, table: &str) -> Result<bool, BackendError> {
        let conn = acquire_lock(&self.conn, "SQLite connection");
        let found = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ?1",
                params![table],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn list_tables(&self) -> Result<Vec<String>, BackendError> {
        let conn = acquire_lock(&self.conn, "SQLite connection");
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tables)
    }

    fn drop_table(&self, table: &str) -> Result<(), BackendError> {
        let conn = acquire_lock(&self.conn, "SQLite connection");
        conn.execute_batch(&format!("DROP TABLE IF EXISTS {}", self.quote(table)))?;
        Ok(())
    }

    fn create_table_from_records(
        &self,
        table: &str,
        columns: &[String],
        rows: &[Vec<Value>],
    ) -> Result<(), BackendError> {
        if columns.is_empty() {
            return Err(BackendError::InvalidRecords(format!(
                "table '{}' needs at least one column",
                table
            )));
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(BackendError::InvalidRecords(format!(
                "row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                columns.len()
            )));
        }

        let quoted_columns: Vec<String> = columns.iter().map(|c| self.quote(c)).collect();
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();
        let create = format!(
            "CREATE TABLE {} ({})",
            self.quote(table),
            quoted_columns.join(", ")
        );
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote(table),
            quoted_columns.join(", "),
            placeholders.join(", ")
        );

        let mut conn = acquire_lock(&self.conn, "SQLite connection");
        let tx = conn.transaction()?;
        tx.execute_batch(&create)?;
        {
            let mut stmt = tx.prepare(&insert)?;
            for row in rows {
                stmt.execute(rusqlite::params_from_iter(row.iter().map(to_sql)))?;
            }
        }
        tx.commit()?;
        log::debug!("Loaded {} rows into {}", rows.len(), table);
        Ok(())
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => SqlValue::Integer(i),
            (None, Some(f)) => SqlValue::Real(f),
            (None, None) => SqlValue::Text(n.to_string()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}
