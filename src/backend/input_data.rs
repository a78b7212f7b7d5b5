use serde_json::Value;

use super::errors::BackendError;
use super::{Row, TableHandle};

/// Externally supplied data to register as a table.
#[derive(Debug, Clone)]
pub enum InputData {
    /// One map per record; columns are the union of keys in first-seen order
    /// and missing keys become NULL.
    RowRecords(Vec<Row>),
    /// Named columns of equal length.
    ColumnarTable(Vec<(String, Vec<Value>)>),
    /// A table that already exists in some backend.
    ExternalHandle(TableHandle),
}

/// Column-ordered records ready to load.
#[derive(Debug, Clone, PartialEq)]
pub struct Records {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// How registration should bring the data into the target backend.
#[derive(Debug)]
pub(crate) enum Ingestion {
    Load(Records),
    Copy(TableHandle),
}

impl InputData {
    /// Build `RowRecords` from JSON objects; anything else is rejected.
    pub fn from_json_rows(rows: Vec<Value>) -> Result<Self, BackendError> {
        rows.into_iter()
            .enumerate()
            .map(|(i, value)| match value {
                Value::Object(map) => Ok(map),
                other => Err(BackendError::InvalidRecords(format!(
                    "record {} is not an object: {}",
                    i, other
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(InputData::RowRecords)
    }

    pub fn from_columns<S: Into<String>>(columns: Vec<(S, Vec<Value>)>) -> Self {
        InputData::ColumnarTable(
            columns
                .into_iter()
                .map(|(name, values)| (name.into(), values))
                .collect(),
        )
    }

    /// Column names the registered table will have.
    pub fn column_names(&self) -> Result<Vec<String>, BackendError> {
        match self {
            InputData::RowRecords(rows) => Ok(union_of_keys(rows)),
            InputData::ColumnarTable(columns) => {
                Ok(columns.iter().map(|(name, _)| name.clone()).collect())
            }
            InputData::ExternalHandle(handle) => handle.columns(),
        }
    }

    pub(crate) fn into_ingestion(self) -> Result<Ingestion, BackendError> {
        match self {
            InputData::RowRecords(rows) => rows_to_records(rows).map(Ingestion::Load),
            InputData::ColumnarTable(columns) => columns_to_records(columns).map(Ingestion::Load),
            InputData::ExternalHandle(handle) => Ok(Ingestion::Copy(handle)),
        }
    }
}

impl From<Vec<Row>> for InputData {
    fn from(rows: Vec<Row>) -> Self {
        InputData::RowRecords(rows)
    }
}

impl From<TableHandle> for InputData {
    fn from(handle: TableHandle) -> Self {
        InputData::ExternalHandle(handle)
    }
}

fn union_of_keys(rows: &[Row]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for key in rows.iter().flat_map(|row| row.keys()) {
        if !columns.contains(key) {
            columns.push(key.clone());
        }
    }
    columns
}

fn rows_to_records(rows: Vec<Row>) -> Result<Records, BackendError> {
    let columns = union_of_keys(&rows);
    if columns.is_empty() {
        return Err(BackendError::InvalidRecords(
            "no columns found in row records".to_string(),
        ));
    }
    let rows = rows
        .into_iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    Ok(Records { columns, rows })
}

fn columns_to_records(columns: Vec<(String, Vec<Value>)>) -> Result<Records, BackendError> {
    let Some(expected) = columns.first().map(|(_, values)| values.len()) else {
        return Err(BackendError::InvalidRecords(
            "columnar table has no columns".to_string(),
        ));
    };
    let mut names = Vec::with_capacity(columns.len());
    for (name, values) in &columns {
        if names.contains(name) {
            return Err(BackendError::InvalidRecords(format!(
                "duplicate column '{}'",
                name
            )));
        }
        if values.len() != expected {
            return Err(BackendError::InvalidRecords(format!(
                "column '{}' has {} values, expected {}",
                name,
                values.len(),
                expected
            )));
        }
        names.push(name.clone());
    }

    let mut iters: Vec<_> = columns.into_iter().map(|(_, v)| v.into_iter()).collect();
    let rows = (0..expected)
        .map(|_| {
            iters
                .iter_mut()
                .map(|it| it.next().unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    Ok(Records {
        columns: names,
        rows,
    })
}
