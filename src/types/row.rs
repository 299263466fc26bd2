use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::types::SqlValue;

/// Driver-agnostic raw result from a database query.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    /// Column names in order
    pub columns: Vec<String>,
    /// Rows, where each row is a vector of cell values in column order
    pub rows: Vec<Vec<SqlValue>>,
}

impl RawTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// A single result row.
/// Cell values are accessed by column name.
#[derive(Debug, Clone)]
pub struct Row {
    values: HashMap<String, SqlValue>,
}

impl Row {
    /// Creates a new Row from column names and cell values.
    pub(crate) fn new(columns: &[String], values: Vec<SqlValue>) -> Self {
        let values = columns
            .iter()
            .zip(values.into_iter())
            .map(|(col, val)| (col.clone(), val))
            .collect();
        Self { values }
    }

    /// Gets a cell value by column name.
    pub fn get(&self, column: &str) -> Result<&SqlValue> {
        self.values
            .get(column)
            .ok_or_else(|| Error::ColumnNotFound(column.to_string()))
    }

    /// Returns all column names in this row.
    pub fn columns(&self) -> Vec<&str> {
        self.values.keys().map(|s| s.as_str()).collect()
    }

    /// Returns the number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A fully materialized result set: named columns and zero or more rows.
#[derive(Debug)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Creates a Table from a RawTable.
    pub fn from_raw(raw: RawTable) -> Self {
        let rows = raw
            .rows
            .into_iter()
            .map(|values| Row::new(&raw.columns, values))
            .collect();
        Self {
            columns: raw.columns,
            rows,
        }
    }

    /// Returns all rows, consuming the table.
    pub fn rows(self) -> Vec<Row> {
        self.rows
    }

    /// Returns a reference to the rows without consuming the table.
    pub fn rows_ref(&self) -> &[Row] {
        &self.rows
    }

    /// Returns the column names of this table.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns the number of rows in this table.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if this table contains no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
